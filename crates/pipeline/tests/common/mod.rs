//! Shared fixtures for pipeline integration tests.
//!
//! [`ScriptedClient`] is an in-memory stand-in for both client traits. Every
//! edit operation appends a one-byte tag to its input, so the bytes of a
//! result spell out the stages it went through.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fixpix_core::generation::GenerationStyle;
use fixpix_core::project::{GenerationLimits, Project};
use fixpix_core::types::WorkingImage;
use fixpix_events::bus::EventBus;
use fixpix_inference::client::{
    AccessToken, FaceRestoreParams, GenerationAccepted, InferenceClient, ProjectClient,
};
use fixpix_inference::error::InferenceError;

pub const TAG_FACE: u8 = b'F';
pub const TAG_UPSCALE: u8 = b'U';
pub const TAG_COLORIZE: u8 = b'C';
pub const TAG_SEGMENT: u8 = b'B';
pub const TAG_INPAINT: u8 = b'I';

/// Smallest byte string that sniffs as PNG.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Failure {
    Unreachable,
    Api(u16, String),
}

impl Failure {
    pub fn status(status: u16) -> Self {
        Self::Api(status, String::new())
    }

    fn to_error(&self) -> InferenceError {
        match self {
            Self::Unreachable => InferenceError::Unreachable("connection refused".into()),
            Self::Api(status, body) => InferenceError::Api {
                status: *status,
                body: body.clone(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedClient
// ---------------------------------------------------------------------------

/// One recorded edit call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub op: &'static str,
    pub input: Vec<u8>,
    pub detail: String,
}

#[derive(Default)]
pub struct ScriptedClient {
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<&'static str, Failure>>,
    delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,

    start: Mutex<Option<Result<GenerationAccepted, Failure>>>,
    polls: Mutex<VecDeque<&'static str>>,
    poll_count: AtomicUsize,
    limit_fetches: AtomicUsize,
    limits: Mutex<GenerationLimits>,

    projects: Mutex<Option<Vec<Project>>>,
    media: Mutex<HashMap<String, Vec<u8>>>,
    upload: Mutex<Option<Result<Project, Failure>>>,
    uploads: AtomicUsize,
}

impl ScriptedClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // ---- scripting ----

    pub fn fail_on(&self, op: &'static str, failure: Failure) {
        self.failures.lock().unwrap().insert(op, failure);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Delay every edit call by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn set_start(&self, response: Result<GenerationAccepted, Failure>) {
        *self.start.lock().unwrap() = Some(response);
    }

    /// Statuses returned by successive polls. Once exhausted, polls keep
    /// answering `processing`.
    pub fn script_polls(&self, statuses: &[&'static str]) {
        self.polls.lock().unwrap().extend(statuses.iter().copied());
    }

    pub fn set_limits(&self, limits: GenerationLimits) {
        *self.limits.lock().unwrap() = limits;
    }

    /// `None` makes `list_projects` fail.
    pub fn set_projects(&self, projects: Option<Vec<Project>>) {
        *self.projects.lock().unwrap() = projects;
    }

    pub fn add_media(&self, url: &str, bytes: &[u8]) {
        self.media
            .lock()
            .unwrap()
            .insert(url.to_string(), bytes.to_vec());
    }

    pub fn set_upload(&self, response: Result<Project, Failure>) {
        *self.upload.lock().unwrap() = Some(response);
    }

    // ---- inspection ----

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|c| c.op).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn poll_count(&self) -> usize {
        self.poll_count.load(Ordering::SeqCst)
    }

    pub fn limit_fetches(&self) -> usize {
        self.limit_fetches.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    // ---- internals ----

    async fn edit(
        &self,
        op: &'static str,
        tag: u8,
        image: &WorkingImage,
        detail: String,
    ) -> Result<WorkingImage, InferenceError> {
        self.calls.lock().unwrap().push(Call {
            op,
            input: image.as_bytes().to_vec(),
            detail,
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(failure) = self.failures.lock().unwrap().get(op) {
            return Err(failure.to_error());
        }

        let mut out = image.as_bytes().to_vec();
        out.push(tag);
        Ok(WorkingImage::new(out))
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    async fn restore_face(
        &self,
        image: &WorkingImage,
        params: &FaceRestoreParams,
    ) -> Result<WorkingImage, InferenceError> {
        let detail = format!("{}/{}/{}", params.mode, params.upscale, params.fidelity);
        self.edit("restore_face", TAG_FACE, image, detail).await
    }

    async fn super_resolution(
        &self,
        image: &WorkingImage,
        scale: u32,
    ) -> Result<WorkingImage, InferenceError> {
        self.edit("super_resolution", TAG_UPSCALE, image, scale.to_string())
            .await
    }

    async fn colorize(
        &self,
        image: &WorkingImage,
        render_factor: u32,
    ) -> Result<WorkingImage, InferenceError> {
        self.edit("colorize", TAG_COLORIZE, image, render_factor.to_string())
            .await
    }

    async fn segment(&self, image: &WorkingImage) -> Result<WorkingImage, InferenceError> {
        self.edit("segment", TAG_SEGMENT, image, String::new()).await
    }

    async fn inpaint(
        &self,
        image: &WorkingImage,
        mask: &WorkingImage,
    ) -> Result<WorkingImage, InferenceError> {
        let detail = String::from_utf8_lossy(mask.as_bytes()).into_owned();
        self.edit("inpaint", TAG_INPAINT, image, detail).await
    }

    async fn start_generation(
        &self,
        _prompt: &str,
        _style: GenerationStyle,
        _token: &AccessToken,
    ) -> Result<GenerationAccepted, InferenceError> {
        self.calls.lock().unwrap().push(Call {
            op: "start_generation",
            input: Vec::new(),
            detail: String::new(),
        });
        match self.start.lock().unwrap().clone() {
            Some(Ok(accepted)) => Ok(accepted),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Ok(GenerationAccepted {
                project_id: 1,
                remaining: None,
            }),
        }
    }

    async fn poll_generation_status(
        &self,
        project_id: i64,
        _token: &AccessToken,
    ) -> Result<Project, InferenceError> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        let status = self
            .polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or("processing");
        if status == "error" {
            return Err(Failure::status(500).to_error());
        }
        Ok(Project {
            status: Some(status.to_string()),
            processed_image: (status == "completed").then(|| format!("/media/gen-{project_id}.png")),
            ..project(project_id)
        })
    }
}

#[async_trait]
impl ProjectClient for ScriptedClient {
    async fn upload_image(
        &self,
        title: &str,
        _image: &WorkingImage,
        _token: Option<&AccessToken>,
    ) -> Result<Project, InferenceError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        match self.upload.lock().unwrap().clone() {
            Some(Ok(project)) => Ok(project),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Ok(Project {
                title: Some(title.to_string()),
                ..project(1)
            }),
        }
    }

    async fn list_projects(
        &self,
        _token: Option<&AccessToken>,
    ) -> Result<Vec<Project>, InferenceError> {
        self.projects
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Failure::Unreachable.to_error())
    }

    async fn fetch_image(&self, url: &str) -> Result<WorkingImage, InferenceError> {
        self.media
            .lock()
            .unwrap()
            .get(url)
            .map(|b| WorkingImage::new(b.clone()))
            .ok_or_else(|| Failure::status(404).to_error())
    }

    async fn generation_limits(
        &self,
        _token: &AccessToken,
    ) -> Result<GenerationLimits, InferenceError> {
        self.limit_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.limits.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn bus() -> Arc<EventBus> {
    Arc::new(EventBus::default())
}

pub fn image(bytes: &[u8]) -> WorkingImage {
    WorkingImage::new(bytes.to_vec())
}

pub fn token() -> AccessToken {
    AccessToken::new("test-token")
}

pub fn project(id: i64) -> Project {
    Project {
        id,
        title: None,
        original_image: None,
        processed_image: None,
        settings: None,
        status: None,
    }
}
