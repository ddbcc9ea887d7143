//! Model backend trait and the Ollama implementation.
//!
//! The extraction protocol and the summarizers only see [`ModelBackend`];
//! tests substitute scripted backends.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use posterscope_core::ModelConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Cannot connect to model backend at {0}. Is it running?")]
    Unreachable(String),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Backend error [{status}]: {message}")]
    Api { status: u16, message: String },
    #[error("Failed to read image: {0}")]
    Image(String),
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

// ── Trait ─────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Cheap liveness check; never consumes a model call.
    async fn probe(&self) -> bool;
    /// Vision call: the image bytes travel base64-encoded with the prompt.
    async fn analyze_image(
        &self,
        image: &Path,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, BackendError>;
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, BackendError>;
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: ModelBackend + ?Sized> ModelBackend for Arc<T> {
    async fn probe(&self) -> bool {
        (**self).probe().await
    }

    async fn analyze_image(
        &self,
        image: &Path,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, BackendError> {
        (**self).analyze_image(image, prompt, temperature).await
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, BackendError> {
        (**self).generate(prompt, temperature).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

// ── Request / Response ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

// ── Ollama ────────────────────────────────────────────────────────────────────

pub struct OllamaClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    probe_timeout: Duration,
    generation_timeout: Duration,
    vision_max_tokens: u32,
    text_max_tokens: u32,
}

impl OllamaClient {
    pub fn new(config: &ModelConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(BackendError::Http)?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.name.clone(),
            client,
            probe_timeout: config.probe_timeout(),
            generation_timeout: config.generation_timeout(),
            vision_max_tokens: config.vision_max_tokens,
            text_max_tokens: config.text_max_tokens,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    async fn post_generate(&self, body: &GenerateRequest<'_>) -> Result<String, BackendError> {
        let resp = self
            .client
            .post(self.generate_url())
            .timeout(self.generation_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| self.classify(e, self.generation_timeout))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(text);
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(parsed.response)
    }

    fn classify(&self, err: reqwest::Error, timeout: Duration) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout(timeout.as_secs())
        } else if err.is_connect() {
            BackendError::Unreachable(self.base_url.clone())
        } else {
            BackendError::Http(err)
        }
    }
}

#[async_trait]
impl ModelBackend for OllamaClient {
    async fn probe(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("backend probe failed: {e}");
                false
            }
        }
    }

    async fn analyze_image(
        &self,
        image: &Path,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, BackendError> {
        let bytes = tokio::fs::read(image)
            .await
            .map_err(|e| BackendError::Image(format!("{}: {e}", image.display())))?;

        let body = GenerateRequest {
            model: &self.model,
            prompt,
            images: Some(vec![BASE64.encode(bytes)]),
            stream: false,
            options: GenerateOptions {
                temperature,
                num_predict: self.vision_max_tokens,
            },
        };
        self.post_generate(&body).await
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, BackendError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            images: None,
            stream: false,
            options: GenerateOptions {
                temperature,
                num_predict: self.text_max_tokens,
            },
        };
        self.post_generate(&body).await
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
