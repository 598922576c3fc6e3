//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.kagami/config.json`) and environment.
//! LINE channel secrets may come from the environment instead of the file; the
//! gateway refuses to start without them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// LINE channel settings (secret, access token, API base overrides).
    #[serde(default)]
    pub line: LineConfig,

    /// Vision deployment (Azure OpenAI GPT-4V chat completions).
    #[serde(default)]
    pub vision: VisionConfig,

    /// Image-generation deployment (Azure OpenAI DALL-E 3).
    #[serde(default)]
    pub image_gen: ImageGenConfig,

    /// Public deployment settings (base URL, media staging directory).
    #[serde(default)]
    pub deploy: DeployConfig,
}

/// Gateway bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// HTTP port for the webhook callback (default 8787).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    8787
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// LINE Messaging API channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineConfig {
    /// Channel secret used to verify `X-Line-Signature`. Overridden by LINE_CHANNEL_SECRET env.
    pub channel_secret: Option<String>,
    /// Channel access token for the Messaging API. Overridden by LINE_CHANNEL_ACCESS_TOKEN env.
    pub channel_access_token: Option<String>,
    /// Override for the Messaging API base URL (default https://api.line.me).
    pub api_base: Option<String>,
    /// Override for the content download base URL (default https://api-data.line.me).
    pub data_api_base: Option<String>,
}

/// Azure OpenAI vision deployment (chat completions with image input).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionConfig {
    /// Resource endpoint, e.g. https://my-resource.openai.azure.com
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Deployment name of the GPT-4V model.
    pub deployment: Option<String>,
    #[serde(default = "default_vision_api_version")]
    pub api_version: String,
}

fn default_vision_api_version() -> String {
    "2024-02-15-preview".to_string()
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: None,
            api_version: default_vision_api_version(),
        }
    }
}

/// Azure OpenAI image-generation deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageGenConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    /// Deployment name of the DALL-E 3 model.
    pub deployment: Option<String>,
    #[serde(default = "default_image_gen_api_version")]
    pub api_version: String,
}

fn default_image_gen_api_version() -> String {
    "2024-02-01".to_string()
}

impl Default for ImageGenConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: None,
            api_version: default_image_gen_api_version(),
        }
    }
}

/// Public-facing deployment settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployConfig {
    /// Public base URL under which this gateway is reachable (no trailing slash),
    /// e.g. https://bot.example.com. Staged images are served at {baseUrl}/media/{key},
    /// which the vision service must be able to fetch.
    pub base_url: Option<String>,
    /// Directory for staged inbound images (default ~/.kagami/media).
    pub media_dir: Option<PathBuf>,
    /// Placeholder image returned when generation fails
    /// (default {baseUrl}/static/stop.png).
    pub fallback_image_url: Option<String>,
}

fn env_or(name: &str, fallback: Option<&String>) -> Option<String> {
    std::env::var(name)
        .ok()
        .and_then(|s| {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        })
        .or_else(|| {
            fallback
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Resolve the LINE channel secret: env LINE_CHANNEL_SECRET overrides config.
pub fn resolve_channel_secret(config: &Config) -> Option<String> {
    env_or("LINE_CHANNEL_SECRET", config.line.channel_secret.as_ref())
}

/// Resolve the LINE channel access token: env LINE_CHANNEL_ACCESS_TOKEN overrides config.
pub fn resolve_channel_access_token(config: &Config) -> Option<String> {
    env_or(
        "LINE_CHANNEL_ACCESS_TOKEN",
        config.line.channel_access_token.as_ref(),
    )
}

/// Public base URL with any trailing slash removed. Empty when not configured.
pub fn resolve_base_url(config: &Config) -> String {
    config
        .deploy
        .base_url
        .as_deref()
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .unwrap_or_default()
}

/// Placeholder image URL used when generation fails: explicit config value,
/// otherwise {baseUrl}/static/stop.png.
pub fn resolve_fallback_image_url(config: &Config) -> String {
    config
        .deploy
        .fallback_image_url
        .as_deref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("{}/static/stop.png", resolve_base_url(config)))
}

/// Resolve the media staging directory (default ~/.kagami/media).
pub fn resolve_media_dir(config: &Config) -> PathBuf {
    config.deploy.media_dir.clone().unwrap_or_else(|| {
        dirs::home_dir()
            .map(|h| h.join(".kagami").join("media"))
            .unwrap_or_else(|| PathBuf::from("media"))
    })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("KAGAMI_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".kagami").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or KAGAMI_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
