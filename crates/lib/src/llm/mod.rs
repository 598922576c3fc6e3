//! Azure OpenAI clients: vision description (GPT-4V chat completions) and
//! image generation (DALL-E 3).

mod imagegen;
mod vision;

pub use imagegen::{ImageGenClient, ImageGenError};
pub use vision::{VisionClient, VisionError, FALLBACK_DESCRIPTION};
