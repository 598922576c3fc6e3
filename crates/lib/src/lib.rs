//! Kagami core library — config, LINE channel, AI clients, media staging,
//! and the webhook gateway used by the CLI.

pub mod config;
pub mod gateway;
pub mod init;
pub mod line;
pub mod llm;
pub mod media;
