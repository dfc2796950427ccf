use std::future::Future;
use std::pin::Pin;

use base64::Engine;
use serde_json::json;

use crate::config::AiConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct ImageOptions {
    pub model: String,
    pub size: String,
    pub quality: String,
}

impl ImageOptions {
    pub fn from_config(config: &AiConfig) -> Self {
        ImageOptions {
            model: "gpt-image-1".into(),
            size: config.image_size.clone(),
            quality: config.image_quality.clone(),
        }
    }
}

pub type ImageFuture<'a> = Pin<Box<dyn Future<Output = AppResult<Vec<u8>>> + Send + 'a>>;

/// Image generation/edit endpoint seam. `generate` posts a JSON body;
/// `edit` posts a multipart form with one or two reference images (two for
/// structure + inspiration composites). Both resolve to PNG bytes.
pub trait ImageBackend: Send + Sync {
    fn generate(&self, prompt: String, options: ImageOptions) -> ImageFuture<'_>;
    fn edit(&self, prompt: String, images: Vec<Vec<u8>>, options: ImageOptions) -> ImageFuture<'_>;
}

#[derive(Clone)]
pub struct HttpImageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpImageClient {
    pub fn new(http: reqwest::Client, config: &AiConfig) -> Self {
        HttpImageClient {
            http,
            base_url: config.image_base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    async fn generate_inner(&self, prompt: String, options: ImageOptions) -> AppResult<Vec<u8>> {
        if prompt.trim().is_empty() {
            return Err(AppError::InvalidRequest("Image prompt is empty".into()));
        }

        let body = json!({
            "model": options.model,
            "prompt": prompt,
            "n": 1,
            "size": options.size,
            "quality": options.quality,
        });

        let url = format!("{}/images/generations", self.base_url);
        let mut req = self.http.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Image generation request failed: {e}")))?;
        self.decode_image_response(response).await
    }

    async fn edit_inner(
        &self,
        prompt: String,
        images: Vec<Vec<u8>>,
        options: ImageOptions,
    ) -> AppResult<Vec<u8>> {
        if images.is_empty() {
            return Err(AppError::InvalidRequest("Image edit needs at least one image".into()));
        }

        let mut form = reqwest::multipart::Form::new()
            .text("model", options.model)
            .text("prompt", prompt)
            .text("size", options.size)
            .text("quality", options.quality);

        for (i, bytes) in images.into_iter().enumerate() {
            let part = reqwest::multipart::Part::bytes(bytes)
                .file_name(format!("image_{i}.png"))
                .mime_str("image/png")
                .map_err(|e| AppError::Internal(format!("Bad mime type: {e}")))?;
            form = form.part("image[]", part);
        }

        let url = format!("{}/images/edits", self.base_url);
        let mut req = self.http.post(&url).multipart(form);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Image edit request failed: {e}")))?;
        self.decode_image_response(response).await
    }

    /// Responses carry either a base64 payload or a URL to fetch.
    async fn decode_image_response(&self, response: reqwest::Response) -> AppResult<Vec<u8>> {
        let status = response.status();
        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Image response was not JSON: {e}")))?;

        if !status.is_success() {
            let message = payload
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return Err(AppError::Upstream(format!(
                "Image endpoint returned {status}: {message}"
            )));
        }

        if let Some(b64) = payload.pointer("/data/0/b64_json").and_then(|v| v.as_str()) {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| AppError::Upstream(format!("Bad base64 image payload: {e}")))?;
            if bytes.is_empty() {
                return Err(AppError::Upstream("Image payload was empty".into()));
            }
            return Ok(bytes);
        }

        if let Some(url) = payload.pointer("/data/0/url").and_then(|v| v.as_str()) {
            let bytes = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| AppError::Upstream(format!("Image URL fetch failed: {e}")))?
                .bytes()
                .await
                .map_err(|e| AppError::Upstream(format!("Image URL body failed: {e}")))?;
            if bytes.is_empty() {
                return Err(AppError::Upstream("Image payload was empty".into()));
            }
            return Ok(bytes.to_vec());
        }

        Err(AppError::Upstream("Image response carried neither b64_json nor url".into()))
    }
}

impl ImageBackend for HttpImageClient {
    fn generate(&self, prompt: String, options: ImageOptions) -> ImageFuture<'_> {
        Box::pin(self.generate_inner(prompt, options))
    }

    fn edit(&self, prompt: String, images: Vec<Vec<u8>>, options: ImageOptions) -> ImageFuture<'_> {
        Box::pin(self.edit_inner(prompt, images, options))
    }
}
