//! Inference gateway abstraction and the Gemini client.
//!
//! The webhook handler only sees [`InferenceGateway`]; [`GeminiClient`] is the production backend.

mod gemini;

use crate::error::GatewayError;
use async_trait::async_trait;

pub use gemini::{GeminiClient, GeminiSettings, GenerateContentResponse};

/// Turns one user prompt into reply text.
#[async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Generate a reply. On success the text is always displayable (never empty).
    async fn generate_reply(&self, prompt: &str) -> Result<String, GatewayError>;
}
