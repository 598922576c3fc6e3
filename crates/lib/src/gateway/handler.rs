//! Inbound event dispatch: one straight-line sequence per event.
//!
//! Upstream AI failures degrade to fixed fallback values here (the clients
//! return Result and the substitution happens at this seam); reply failures
//! propagate to the callback handler.

use crate::gateway::server::GatewayState;
use crate::line::{InboundEvent, ReplyMessage};
use crate::llm::FALLBACK_DESCRIPTION;
use anyhow::{Context, Result};

/// Handle one inbound event end to end and send the reply.
pub async fn handle_event(state: &GatewayState, event: InboundEvent) -> Result<()> {
    match event {
        InboundEvent::Text { reply_token, text } => {
            let image_url = generate_or_fallback(state, &text).await;
            state
                .line
                .reply(&reply_token, &[ReplyMessage::image(image_url)])
                .await
                .context("sending reply for text message")?;
            Ok(())
        }
        InboundEvent::Image {
            reply_token,
            message_id,
        } => {
            let bytes = state
                .line
                .get_message_content(&message_id)
                .await
                .context("downloading inbound image content")?;
            let key = state
                .media
                .stage(&bytes)
                .await
                .context("staging inbound image")?;
            let result = describe_and_redraw(state, &reply_token, &key).await;
            // staged only for the duration of this request
            state.media.remove(&key).await;
            result
        }
    }
}

/// Image flow after staging: describe the staged image, generate a new image
/// from the description, reply with [description, image] in order.
async fn describe_and_redraw(state: &GatewayState, reply_token: &str, key: &str) -> Result<()> {
    let image_url = state.media_url(key);
    let description = match state.vision.describe_image(&image_url).await {
        Ok(d) => d,
        Err(e) => {
            log::warn!("vision description failed, using fallback: {}", e);
            FALLBACK_DESCRIPTION.to_string()
        }
    };
    // description flows straight into the generation prompt; no shared state
    let generated_url = generate_or_fallback(state, &description).await;
    state
        .line
        .reply(
            reply_token,
            &[
                ReplyMessage::text(description),
                ReplyMessage::image(generated_url),
            ],
        )
        .await
        .context("sending reply for image message")?;
    Ok(())
}

/// One generation attempt; on failure return the configured placeholder URL.
async fn generate_or_fallback(state: &GatewayState, prompt: &str) -> String {
    match state.image_gen.generate(prompt).await {
        Ok(url) => url,
        Err(e) => {
            log::warn!("image generation failed, using placeholder: {}", e);
            state.fallback_image_url.as_ref().clone()
        }
    }
}
