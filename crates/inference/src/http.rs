//! HTTP implementation of the client traits.
//!
//! Edit operations are multipart `POST`s to the AI server that answer with
//! a JSON object carrying the result image as base64. Project operations
//! talk JSON to the project backend with a bearer token.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use fixpix_core::generation::GenerationStyle;
use fixpix_core::project::{resolve_media_url, GenerationLimits, Project};
use fixpix_core::types::WorkingImage;
use reqwest::multipart::{Form, Part};

use crate::client::{
    AccessToken, FaceRestoreParams, GenerationAccepted, InferenceClient, ProjectClient,
};
use crate::config::ClientConfig;
use crate::error::InferenceError;

// ---------------------------------------------------------------------------
// Endpoint paths
// ---------------------------------------------------------------------------

const PATH_RESTORE_FACE: &str = "/restore-face";
const PATH_SUPER_RESOLUTION: &str = "/super-resolution";
const PATH_COLORIZE: &str = "/colorize";
const PATH_SEGMENT: &str = "/segment";
const PATH_INPAINT: &str = "/inpaint";

const PATH_IMAGES: &str = "/api/images/";
const PATH_GENERATE: &str = "/api/generate/";
const PATH_GENERATION_STATUS: &str = "/api/generate/status/";

/// HTTP client for the AI server and the project backend.
pub struct HttpClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpClient {
    /// Build a client, applying the configured request timeout if any.
    pub fn new(config: ClientConfig) -> Result<Self, InferenceError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(InferenceError::Request)?;
        Ok(Self { client, config })
    }

    fn ai_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.ai_base_url)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base_url)
    }

    /// Send one edit-stage form and decode the image from the first of
    /// `fields` present in the JSON response.
    async fn post_stage(
        &self,
        path: &str,
        form: Form,
        fields: &[&str],
    ) -> Result<WorkingImage, InferenceError> {
        let url = self.ai_url(path);
        tracing::debug!(url = %url, "Sending inference request");

        let response = self.client.post(&url).multipart(form).send().await?;
        let body: serde_json::Value = parse_response(response).await?;
        decode_image_field(&body, fields)
    }

    // ---- private helpers ----

    fn authorized(
        &self,
        request: reqwest::RequestBuilder,
        token: Option<&AccessToken>,
    ) -> reqwest::RequestBuilder {
        match token {
            Some(token) => request.bearer_auth(token.as_str()),
            None => request,
        }
    }
}

#[async_trait]
impl InferenceClient for HttpClient {
    async fn restore_face(
        &self,
        image: &WorkingImage,
        params: &FaceRestoreParams,
    ) -> Result<WorkingImage, InferenceError> {
        let form = Form::new()
            .part("file", image_part(image, "image.png"))
            .text("mode", params.mode)
            .text("upscale", params.upscale.to_string())
            .text("fidelity", params.fidelity.to_string());
        self.post_stage(PATH_RESTORE_FACE, form, &["restored_image"])
            .await
    }

    async fn super_resolution(
        &self,
        image: &WorkingImage,
        scale: u32,
    ) -> Result<WorkingImage, InferenceError> {
        let form = Form::new()
            .part("file", image_part(image, "image.png"))
            .text("scale", scale.to_string());
        self.post_stage(PATH_SUPER_RESOLUTION, form, &["upscaled_image"])
            .await
    }

    async fn colorize(
        &self,
        image: &WorkingImage,
        render_factor: u32,
    ) -> Result<WorkingImage, InferenceError> {
        let form = Form::new()
            .part("image", image_part(image, "image.png"))
            .text("render_factor", render_factor.to_string());
        self.post_stage(PATH_COLORIZE, form, &["colorized_image"])
            .await
    }

    async fn segment(&self, image: &WorkingImage) -> Result<WorkingImage, InferenceError> {
        let form = Form::new().part("image", image_part(image, "image.png"));
        self.post_stage(PATH_SEGMENT, form, &["segmented_image", "mask"])
            .await
    }

    async fn inpaint(
        &self,
        image: &WorkingImage,
        mask: &WorkingImage,
    ) -> Result<WorkingImage, InferenceError> {
        let form = Form::new()
            .part("image", image_part(image, "image.png"))
            .part("mask", image_part(mask, "mask.png"));
        self.post_stage(PATH_INPAINT, form, &["inpainted_image"])
            .await
    }

    async fn start_generation(
        &self,
        prompt: &str,
        style: GenerationStyle,
        token: &AccessToken,
    ) -> Result<GenerationAccepted, InferenceError> {
        let body = serde_json::json!({
            "prompt": prompt,
            "style": style,
        });

        let response = self
            .client
            .post(self.api_url(PATH_GENERATE))
            .bearer_auth(token.as_str())
            .json(&body)
            .send()
            .await?;

        parse_response(response).await
    }

    async fn poll_generation_status(
        &self,
        project_id: i64,
        token: &AccessToken,
    ) -> Result<Project, InferenceError> {
        let response = self
            .client
            .get(self.api_url(&format!("{PATH_IMAGES}{project_id}/")))
            .bearer_auth(token.as_str())
            .send()
            .await?;

        parse_response(response).await
    }
}

#[async_trait]
impl ProjectClient for HttpClient {
    async fn upload_image(
        &self,
        title: &str,
        image: &WorkingImage,
        token: Option<&AccessToken>,
    ) -> Result<Project, InferenceError> {
        let form = Form::new()
            .part("original_image", image_part(image, title))
            .text("title", title.to_string());

        let request = self.client.post(self.api_url(PATH_IMAGES)).multipart(form);
        let response = self.authorized(request, token).send().await?;
        parse_response(response).await
    }

    async fn list_projects(
        &self,
        token: Option<&AccessToken>,
    ) -> Result<Vec<Project>, InferenceError> {
        let request = self.client.get(self.api_url(PATH_IMAGES));
        let response = self.authorized(request, token).send().await?;
        parse_response(response).await
    }

    async fn fetch_image(&self, url: &str) -> Result<WorkingImage, InferenceError> {
        let url = resolve_media_url(&self.config.api_base_url, url);
        let response = self.client.get(&url).send().await?;
        let response = ensure_success(response).await?;
        let bytes = response.bytes().await?;
        Ok(WorkingImage::new(bytes.to_vec()))
    }

    async fn generation_limits(
        &self,
        token: &AccessToken,
    ) -> Result<GenerationLimits, InferenceError> {
        let response = self
            .client
            .get(self.api_url(PATH_GENERATION_STATUS))
            .bearer_auth(token.as_str())
            .send()
            .await?;
        parse_response(response).await
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn image_part(image: &WorkingImage, file_name: &str) -> Part {
    Part::bytes(image.as_bytes().to_vec()).file_name(file_name.to_string())
}

/// Ensure the response has a success status code. Returns the response
/// unchanged on success, or an [`InferenceError::Api`] containing the
/// status and body text on failure.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, InferenceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(InferenceError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

/// Parse a successful JSON response body into the expected type.
async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, InferenceError> {
    let response = ensure_success(response).await?;
    Ok(response.json::<T>().await?)
}

/// Decode the base64 image held by the first of `fields` present in `body`.
///
/// A `data:<mime>;base64,` prefix is tolerated.
pub fn decode_image_field(
    body: &serde_json::Value,
    fields: &[&str],
) -> Result<WorkingImage, InferenceError> {
    let encoded = fields
        .iter()
        .find_map(|f| body.get(*f).and_then(|v| v.as_str()))
        .ok_or_else(|| {
            InferenceError::Decode(format!("response has none of: {}", fields.join(", ")))
        })?;

    let payload = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };

    BASE64
        .decode(payload.trim())
        .map(WorkingImage::new)
        .map_err(|e| InferenceError::Decode(format!("invalid base64 image: {e}")))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_first_present_field() {
        let body = json!({"mask": BASE64.encode([1u8, 2, 3])});
        let img = decode_image_field(&body, &["segmented_image", "mask"]).unwrap();
        assert_eq!(img.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn prefers_earlier_field() {
        let body = json!({
            "segmented_image": BASE64.encode([9u8]),
            "mask": BASE64.encode([1u8]),
        });
        let img = decode_image_field(&body, &["segmented_image", "mask"]).unwrap();
        assert_eq!(img.as_bytes(), &[9]);
    }

    #[test]
    fn tolerates_data_url_prefix() {
        let body = json!({
            "restored_image": format!("data:image/jpeg;base64,{}", BASE64.encode([7u8, 7]))
        });
        let img = decode_image_field(&body, &["restored_image"]).unwrap();
        assert_eq!(img.as_bytes(), &[7, 7]);
    }

    #[test]
    fn missing_field_is_decode_error() {
        let body = json!({"other": "x"});
        assert_matches!(
            decode_image_field(&body, &["colorized_image"]),
            Err(InferenceError::Decode(_))
        );
    }

    #[test]
    fn invalid_base64_is_decode_error() {
        let body = json!({"upscaled_image": "not base64 !!"});
        assert_matches!(
            decode_image_field(&body, &["upscaled_image"]),
            Err(InferenceError::Decode(_))
        );
    }

    #[test]
    fn urls_join_base_and_path() {
        let client = HttpClient::new(ClientConfig {
            ai_base_url: "http://ai:8001".into(),
            api_base_url: "http://api:8000".into(),
            request_timeout: None,
        })
        .unwrap();
        assert_eq!(client.ai_url(PATH_COLORIZE), "http://ai:8001/colorize");
        assert_eq!(client.api_url(PATH_IMAGES), "http://api:8000/api/images/");
    }

    #[tokio::test]
    async fn closed_port_is_reported_unreachable() {
        let client = HttpClient::new(ClientConfig {
            ai_base_url: "http://127.0.0.1:9".into(),
            api_base_url: "http://127.0.0.1:9".into(),
            request_timeout: Some(std::time::Duration::from_secs(5)),
        })
        .unwrap();

        let err = client
            .segment(&WorkingImage::new(vec![0u8; 4]))
            .await
            .unwrap_err();
        assert!(err.is_unreachable(), "unexpected error: {err}");
    }
}
