//! Image-generation client: text prompt to image URL via a DALL-E 3 deployment.

use serde::{Deserialize, Serialize};

/// Client for an images/generations deployment. One attempt per call, no retry.
#[derive(Clone)]
pub struct ImageGenClient {
    endpoint: String,
    deployment: String,
    api_version: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageGenError {
    #[error("image generation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("image generation api error: {0}")]
    Api(String),
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    n: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: String,
}

impl ImageGenClient {
    pub fn new(endpoint: String, api_key: String, deployment: String, api_version: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment,
            api_version,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Generate exactly one image from `prompt`; returns its URL.
    pub async fn generate(&self, prompt: &str) -> Result<String, ImageGenError> {
        let url = format!(
            "{}/openai/deployments/{}/images/generations?api-version={}",
            self.endpoint, self.deployment, self.api_version
        );
        let body = GenerateRequest { prompt, n: 1 };
        let res = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ImageGenError::Api(format!("{} {}", status, body)));
        }
        let data: GenerateResponse = res.json().await?;
        data.data
            .into_iter()
            .next()
            .map(|img| img.url)
            .ok_or_else(|| ImageGenError::Api("response contained no images".to_string()))
    }
}
