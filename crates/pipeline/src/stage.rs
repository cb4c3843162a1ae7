//! The fixed, ordered set of edit stages.

use std::fmt;

use fixpix_core::settings::Settings;

/// One conditionally-executed step of the edit pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    FaceRestoration,
    SuperResolution,
    Colorization,
    BackgroundRemoval,
    /// Mask inpainting. Driven by a per-call mask, never by settings.
    ObjectRemoval,
}

impl Stage {
    /// Every stage, in execution order.
    pub const ALL: [Stage; 5] = [
        Stage::FaceRestoration,
        Stage::SuperResolution,
        Stage::Colorization,
        Stage::BackgroundRemoval,
        Stage::ObjectRemoval,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::FaceRestoration => "Face Restoration",
            Self::SuperResolution => "Super Resolution",
            Self::Colorization => "Colorization",
            Self::BackgroundRemoval => "Background Removal",
            Self::ObjectRemoval => "Object Removal",
        }
    }

    /// Whether this stage runs for `settings` (already merged with
    /// overrides) and the presence of a mask.
    pub fn is_enabled(self, settings: &Settings, has_mask: bool) -> bool {
        match self {
            Self::FaceRestoration => settings.face_restoration,
            Self::SuperResolution => settings.upscale_x > 1,
            Self::Colorization => settings.colorize,
            Self::BackgroundRemoval => settings.remove_background,
            Self::ObjectRemoval => has_mask,
        }
    }

    /// Stages that will run, in order.
    pub fn plan(settings: &Settings, has_mask: bool) -> Vec<Stage> {
        Self::ALL
            .into_iter()
            .filter(|s| s.is_enabled(settings, has_mask))
            .collect()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
