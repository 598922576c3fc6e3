//! Webhook gateway: HTTP server and inbound event dispatch.

mod handler;
mod server;

pub use server::{run_gateway, GatewayState};
