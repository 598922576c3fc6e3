//! Outbound reply message wire types (LINE Messaging API JSON shapes).

use serde::Serialize;

/// One reply message. Serializes to the Messaging API shapes:
/// `{"type":"text","text":...}` and
/// `{"type":"image","originalContentUrl":...,"previewImageUrl":...}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReplyMessage {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        original_content_url: String,
        preview_image_url: String,
    },
}

impl ReplyMessage {
    pub fn text(text: impl Into<String>) -> Self {
        ReplyMessage::Text { text: text.into() }
    }

    /// Image message; the preview URL is the content URL itself.
    pub fn image(url: impl Into<String>) -> Self {
        let url = url.into();
        ReplyMessage::Image {
            preview_image_url: url.clone(),
            original_content_url: url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_shape() {
        let json = serde_json::to_value(ReplyMessage::text("hello")).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "text", "text": "hello" }));
    }

    #[test]
    fn image_message_shape() {
        let json = serde_json::to_value(ReplyMessage::image("https://img.example.com/a.png"))
            .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "image",
                "originalContentUrl": "https://img.example.com/a.png",
                "previewImageUrl": "https://img.example.com/a.png"
            })
        );
    }
}
