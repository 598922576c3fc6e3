//! LINE Messaging API client: reply delivery and message content download.

use crate::line::messages::ReplyMessage;
use serde::Serialize;

const LINE_API_BASE: &str = "https://api.line.me";
const LINE_DATA_API_BASE: &str = "https://api-data.line.me";

/// Client for the Messaging API (reply) and the content API (media download).
#[derive(Clone)]
pub struct LineClient {
    api_base: String,
    data_api_base: String,
    access_token: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("line request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("line api error: {0}")]
    Api(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: &'a [ReplyMessage],
}

impl LineClient {
    pub fn new(
        access_token: String,
        api_base: Option<String>,
        data_api_base: Option<String>,
    ) -> Self {
        let trim = |u: String| u.trim_end_matches('/').to_string();
        Self {
            api_base: api_base.map(trim).unwrap_or_else(|| LINE_API_BASE.to_string()),
            data_api_base: data_api_base
                .map(trim)
                .unwrap_or_else(|| LINE_DATA_API_BASE.to_string()),
            access_token,
            client: reqwest::Client::new(),
        }
    }

    /// POST /v2/bot/message/reply — send 1–2 ordered messages as one reply.
    /// Reply tokens are single-use; the platform rejects a second use and the
    /// error is returned to the caller rather than masked.
    pub async fn reply(
        &self,
        reply_token: &str,
        messages: &[ReplyMessage],
    ) -> Result<(), LineError> {
        let url = format!("{}/v2/bot/message/reply", self.api_base);
        let body = ReplyRequest {
            reply_token,
            messages,
        };
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LineError::Api(format!("reply failed: {} {}", status, body)));
        }
        Ok(())
    }

    /// GET /v2/bot/message/{id}/content — download the binary content of an
    /// inbound message (e.g. the uploaded image bytes).
    pub async fn get_message_content(&self, message_id: &str) -> Result<Vec<u8>, LineError> {
        let url = format!("{}/v2/bot/message/{}/content", self.data_api_base, message_id);
        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(LineError::Api(format!(
                "get content failed: {} {}",
                status, body
            )));
        }
        Ok(res.bytes().await?.to_vec())
    }
}
