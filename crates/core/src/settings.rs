//! Edit settings: the fixed, strongly-typed option set and its patches.
//!
//! [`Settings`] always carries the complete key set. Partial updates are
//! expressed as a [`SettingsPatch`] and applied field by field, which is
//! the typed equivalent of a shallow object merge.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Wire names of every setting, in declaration order.
pub const SETTING_KEYS: &[&str] = &[
    "removeScratches",
    "faceRestoration",
    "upscaleX",
    "colorize",
    "brightness",
    "contrast",
    "saturation",
    "autoEnhance",
    "removeBackground",
    "filterPreset",
    "whiteBalance",
    "denoiseStrength",
];

/// Filter preset meaning "no filter applied".
pub const FILTER_PRESET_NONE: &str = "none";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Complete edit option set for one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub remove_scratches: bool,
    pub face_restoration: bool,
    /// Super-resolution factor. `1` disables the upscale stage.
    #[serde(deserialize_with = "whole_number::deserialize")]
    pub upscale_x: u32,
    pub colorize: bool,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub auto_enhance: bool,
    pub remove_background: bool,
    pub filter_preset: String,
    pub white_balance: bool,
    pub denoise_strength: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remove_scratches: false,
            face_restoration: false,
            upscale_x: 1,
            colorize: false,
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            auto_enhance: false,
            remove_background: false,
            filter_preset: FILTER_PRESET_NONE.to_string(),
            white_balance: false,
            denoise_strength: 0.0,
        }
    }
}

impl Settings {
    /// Return a copy of `self` with every `Some` field of `patch` applied.
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        let mut next = self.clone();
        next.apply(patch);
        next
    }

    /// Apply every `Some` field of `patch` in place.
    pub fn apply(&mut self, patch: &SettingsPatch) {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(v) = &patch.$field {
                        self.$field = v.clone();
                    }
                )*
            };
        }
        take!(
            remove_scratches,
            face_restoration,
            upscale_x,
            colorize,
            brightness,
            contrast,
            saturation,
            auto_enhance,
            remove_background,
            filter_preset,
            white_balance,
            denoise_strength,
        );
    }

    /// Build settings from a project's stored settings JSON.
    ///
    /// `None`, `null` and `{}` all yield the defaults. Any other object is
    /// merged over the defaults so the result always has the full key set;
    /// keys the client does not know are dropped.
    pub fn from_stored(stored: Option<&Value>) -> Result<Self, CoreError> {
        match stored {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::Object(map)) if map.is_empty() => Ok(Self::default()),
            Some(value @ Value::Object(_)) => {
                let patch: SettingsPatch = serde_json::from_value(value.clone()).map_err(|e| {
                    CoreError::Validation(format!("Stored settings are malformed: {e}"))
                })?;
                Ok(Self::default().merged(&patch))
            }
            Some(other) => Err(CoreError::Validation(format!(
                "Stored settings must be a JSON object, got {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// SettingsPatch
// ---------------------------------------------------------------------------

/// A partial update of [`Settings`]. `None` fields leave the target as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_scratches: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_restoration: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "whole_number::deserialize_option"
    )]
    pub upscale_x: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colorize: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_enhance: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_background: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub white_balance: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denoise_strength: Option<f32>,
}

impl SettingsPatch {
    /// Build a single-field patch from a wire key and a JSON value.
    ///
    /// Rejects unknown keys, `null`, and values of the wrong type, so a
    /// string-keyed update can never introduce a key outside the fixed set.
    pub fn from_key_value(key: &str, value: Value) -> Result<Self, CoreError> {
        if !SETTING_KEYS.contains(&key) {
            return Err(CoreError::Validation(format!(
                "Unknown setting '{key}'. Must be one of: {}",
                SETTING_KEYS.join(", ")
            )));
        }
        if value.is_null() {
            return Err(CoreError::Validation(format!(
                "Setting '{key}' cannot be null"
            )));
        }

        let mut map = serde_json::Map::with_capacity(1);
        map.insert(key.to_string(), value);
        serde_json::from_value(Value::Object(map))
            .map_err(|e| CoreError::Validation(format!("Invalid value for '{key}': {e}")))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Integer settings may be stored as floats (`2.0`) by other clients.
/// Any whole, non-negative number that fits is accepted.
mod whole_number {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Number;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let n = Number::deserialize(deserializer)?;
        to_u32(&n)
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u32>, D::Error> {
        Option::<Number>::deserialize(deserializer)?
            .map(|n| to_u32(&n))
            .transpose()
    }

    fn to_u32<E: Error>(n: &Number) -> Result<u32, E> {
        let whole = match n.as_u64() {
            Some(v) => u32::try_from(v).ok(),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
                .map(|f| f as u32),
        };
        whole.ok_or_else(|| E::custom(format!("expected a whole number, got {n}")))
    }
}
