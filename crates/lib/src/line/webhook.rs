//! Webhook payload decode and `X-Line-Signature` verification.

use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

/// Verify the `X-Line-Signature` header: base64(HMAC-SHA256(channel_secret, body)).
/// Returns false on any decode or verification failure.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature_b64: &str) -> bool {
    let Ok(expected) =
        base64::engine::general_purpose::STANDARD.decode(signature_b64.trim().as_bytes())
    else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Webhook request body: a batch of events per delivery.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// One raw webhook event. Only message events with text or image content
/// are handled; everything else decodes but maps to no inbound event.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub message: Option<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub typ: String,
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// A webhook event the dispatcher knows how to answer.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// Text message: the text becomes an image-generation prompt.
    Text { reply_token: String, text: String },
    /// Image message: content is downloaded by `message_id`, described, and redrawn.
    Image {
        reply_token: String,
        message_id: String,
    },
}

impl WebhookEvent {
    /// Refine a raw event into an `InboundEvent`. Non-message events and
    /// message types other than text/image (sticker, video, location, ...)
    /// return None and are dropped by the caller.
    pub fn into_inbound(self) -> Option<InboundEvent> {
        if self.typ != "message" {
            log::debug!("ignoring webhook event type: {}", self.typ);
            return None;
        }
        let reply_token = self.reply_token?;
        let message = self.message?;
        match message.typ.as_str() {
            "text" => Some(InboundEvent::Text {
                reply_token,
                text: message.text.unwrap_or_default(),
            }),
            "image" => Some(InboundEvent::Image {
                reply_token,
                message_id: message.id,
            }),
            other => {
                log::debug!("ignoring message type: {}", other);
                None
            }
        }
    }
}
