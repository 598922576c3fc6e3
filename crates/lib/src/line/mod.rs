//! LINE Messaging API channel.
//!
//! Webhook payload decode + signature verification, reply message wire types,
//! and the HTTP client for the reply and content-download endpoints.

mod client;
mod messages;
mod webhook;

pub use client::{LineClient, LineError};
pub use messages::ReplyMessage;
pub use webhook::{verify_signature, InboundEvent, WebhookEvent, WebhookRequest};
