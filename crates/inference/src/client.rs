//! Client traits the orchestration layer is written against.
//!
//! Production code uses [`HttpClient`](crate::http::HttpClient); tests
//! substitute in-memory implementations.

use std::fmt;

use async_trait::async_trait;
use fixpix_core::generation::GenerationStyle;
use fixpix_core::project::{GenerationLimits, Project};
use fixpix_core::types::WorkingImage;
use serde::Deserialize;

use crate::error::InferenceError;

// ---------------------------------------------------------------------------
// Fixed stage parameters
// ---------------------------------------------------------------------------

/// Restoration mode sent to the face restoration endpoint.
pub const FACE_RESTORE_MODE: &str = "quality";

/// Identity-fidelity trade-off sent to the face restoration endpoint.
pub const FACE_RESTORE_FIDELITY: f32 = 0.5;

/// Render factor sent to the colorization endpoint.
pub const COLORIZE_RENDER_FACTOR: u32 = 35;

/// Parameters of a face restoration request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceRestoreParams {
    pub mode: &'static str,
    pub upscale: bool,
    pub fidelity: f32,
}

impl Default for FaceRestoreParams {
    fn default() -> Self {
        Self {
            mode: FACE_RESTORE_MODE,
            upscale: true,
            fidelity: FACE_RESTORE_FIDELITY,
        }
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Bearer access token for the project backend.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Response of an accepted generation start request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerationAccepted {
    /// Project that will hold the generated image; polled for status.
    pub project_id: i64,
    /// Generations left today, when the backend reports it.
    #[serde(default)]
    pub remaining: Option<u32>,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Remote AI operations. Each edit operation consumes one image and
/// returns a new one; a non-2xx response is an error.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn restore_face(
        &self,
        image: &WorkingImage,
        params: &FaceRestoreParams,
    ) -> Result<WorkingImage, InferenceError>;

    async fn super_resolution(
        &self,
        image: &WorkingImage,
        scale: u32,
    ) -> Result<WorkingImage, InferenceError>;

    async fn colorize(
        &self,
        image: &WorkingImage,
        render_factor: u32,
    ) -> Result<WorkingImage, InferenceError>;

    /// Background removal; returns the matted image.
    async fn segment(&self, image: &WorkingImage) -> Result<WorkingImage, InferenceError>;

    async fn inpaint(
        &self,
        image: &WorkingImage,
        mask: &WorkingImage,
    ) -> Result<WorkingImage, InferenceError>;

    async fn start_generation(
        &self,
        prompt: &str,
        style: GenerationStyle,
        token: &AccessToken,
    ) -> Result<GenerationAccepted, InferenceError>;

    /// Fetch the generation project; its `status` drives polling.
    async fn poll_generation_status(
        &self,
        project_id: i64,
        token: &AccessToken,
    ) -> Result<Project, InferenceError>;
}

/// Project backend: uploads, listings, media and quota.
#[async_trait]
pub trait ProjectClient: Send + Sync {
    async fn upload_image(
        &self,
        title: &str,
        image: &WorkingImage,
        token: Option<&AccessToken>,
    ) -> Result<Project, InferenceError>;

    async fn list_projects(&self, token: Option<&AccessToken>)
        -> Result<Vec<Project>, InferenceError>;

    /// Download media referenced by a project (absolute or media-relative).
    async fn fetch_image(&self, url: &str) -> Result<WorkingImage, InferenceError>;

    async fn generation_limits(
        &self,
        token: &AccessToken,
    ) -> Result<GenerationLimits, InferenceError>;
}
