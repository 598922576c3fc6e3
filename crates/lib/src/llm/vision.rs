//! Vision client: describe an image via an Azure OpenAI GPT-4V deployment.

use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str = "你觀察入微，擅長從圖像與圖表中找到資訊。使用繁體中文回答。";
const DESCRIBE_PROMPT: &str = "請詳細描述這張圖片。";
const MAX_TOKENS: u32 = 800;
const TOP_P: f32 = 0.95;

/// User-facing stand-in when the vision call fails. The caller substitutes
/// this; the client itself returns the error.
pub const FALLBACK_DESCRIPTION: &str = "系統異常，請再試一次。";

/// Client for a chat-completions deployment with image input.
#[derive(Clone)]
pub struct VisionClient {
    endpoint: String,
    deployment: String,
    api_version: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("vision request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("vision api error: {0}")]
    Api(String),
}

#[derive(Serialize)]
struct ChatRequest {
    messages: Vec<RequestMessage>,
    max_tokens: u32,
    top_p: f32,
}

#[derive(Serialize)]
struct RequestMessage {
    role: &'static str,
    content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl VisionClient {
    pub fn new(endpoint: String, api_key: String, deployment: String, api_version: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            deployment,
            api_version,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Describe the image at `image_url` (must be publicly reachable by the
    /// service). Returns the first choice's message content.
    pub async fn describe_image(&self, image_url: &str) -> Result<String, VisionError> {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        );
        let body = ChatRequest {
            messages: vec![
                RequestMessage {
                    role: "system",
                    content: serde_json::Value::String(SYSTEM_PROMPT.to_string()),
                },
                RequestMessage {
                    role: "user",
                    content: serde_json::json!([
                        { "type": "text", "text": DESCRIBE_PROMPT },
                        { "type": "image_url", "image_url": { "url": image_url } }
                    ]),
                },
            ],
            max_tokens: MAX_TOKENS,
            top_p: TOP_P,
        };
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
            return Err(VisionError::Api(format!("{} {}", status, body)));
        }
        let data: ChatResponse = res.json().await?;
        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| VisionError::Api("response contained no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_first_choice_content() {
        let raw = r#"{
            "choices": [
                { "message": { "role": "assistant", "content": "一隻橘貓坐在窗邊。" } },
                { "message": { "role": "assistant", "content": "second" } }
            ]
        }"#;
        let data: ChatResponse = serde_json::from_str(raw).unwrap();
        let content = data
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        assert_eq!(content.as_deref(), Some("一隻橘貓坐在窗邊。"));
    }

    #[test]
    fn empty_choices_is_none() {
        let data: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(data.choices.is_empty());
    }
}
