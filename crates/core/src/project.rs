//! Backend project records and generation quota.

use serde::{Deserialize, Serialize};

/// An uploaded or generated image as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    /// URL (absolute or media-relative) of the original image.
    #[serde(default)]
    pub original_image: Option<String>,
    /// URL of the processed image, once one exists.
    #[serde(default)]
    pub processed_image: Option<String>,
    /// Settings the project was last edited with, as stored JSON.
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
    /// Generation job status for text-to-image projects.
    #[serde(default)]
    pub status: Option<String>,
}

/// Daily text-to-image quota as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationLimits {
    #[serde(default)]
    pub daily_limit: Option<u32>,
    #[serde(default)]
    pub used_today: Option<u32>,
    #[serde(default)]
    pub remaining: Option<u32>,
}

/// Resolve a media path returned by the backend against its base URL.
///
/// Absolute `http(s)://` URLs are returned unchanged.
pub fn resolve_media_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_deserializes_with_missing_optional_fields() {
        let project: Project = serde_json::from_str(r#"{"id": 12}"#).unwrap();
        assert_eq!(project.id, 12);
        assert!(project.original_image.is_none());
        assert!(project.settings.is_none());
    }

    #[test]
    fn media_url_absolute_is_unchanged() {
        assert_eq!(
            resolve_media_url("http://api", "https://cdn/x.png"),
            "https://cdn/x.png"
        );
    }

    #[test]
    fn media_url_relative_is_joined_once() {
        assert_eq!(
            resolve_media_url("http://api/", "/media/x.png"),
            "http://api/media/x.png"
        );
        assert_eq!(
            resolve_media_url("http://api", "media/x.png"),
            "http://api/media/x.png"
        );
    }
}
