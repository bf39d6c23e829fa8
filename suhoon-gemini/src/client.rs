use std::time::Duration;

use anyhow::Context;
use log::{debug, info, warn};
use reqwest::header::CONTENT_TYPE;
use suhoon_logic::{DiagnosisClient, DiagnosisError, DiagnosisRequest, DiagnosisResult, prelude};

use crate::{
    endpoint::{API_HOST, API_KEY_HEADER, DEFAULT_MODEL, api_key_from_env, generate_url},
    wire::{GenerateContentRequest, GenerateContentResponse},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// [DiagnosisClient] backed by the Gemini `generateContent` API
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    host: String,
    model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("host", &self.host)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> prelude::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            host: API_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Create a client with the API key from `GEMINI_API_KEY` or `API_KEY`
    pub fn from_env() -> prelude::Result<Self> {
        Self::new(api_key_from_env()?)
    }

    /// Send requests somewhere other than the public API
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &DiagnosisRequest) -> prelude::Result<String> {
        let url = generate_url(&self.host, &self.model);
        let body = serde_json::to_vec(&GenerateContentRequest::from(request))
            .context("Failed to encode request")?;

        debug!("POST {url} ({} bytes)", body.len());

        self.http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(API_KEY_HEADER, &self.api_key)
            .body(body)
            .send()
            .await
            .context("Could not send request")?
            .error_for_status()
            .context("Server returned error")?
            .text()
            .await
            .context("Failed to read response body")
    }
}

impl DiagnosisClient for GeminiClient {
    async fn diagnose(
        &self,
        request: &DiagnosisRequest,
    ) -> Result<DiagnosisResult, DiagnosisError> {
        info!("Requesting diagnosis from {}", self.model);

        let raw = self.generate(request).await?;
        let response = serde_json::from_str::<GenerateContentResponse>(&raw)?;

        let Some(text) = response.text() else {
            warn!("Model answered without any text");
            return Err(DiagnosisError::EmptyResponse);
        };

        DiagnosisResult::parse(&text)
    }
}
