//! LLM client abstraction.
//!
//! The step loop only needs one operation: send the ordered transcript and get
//! the reply text back. Everything about the wire protocol lives behind
//! [`LlmClient`].

mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use gemini::GeminiClient;

/// Role of a content block on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireRole {
    User,
    Model,
}

/// One entry of the request transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub role: WireRole,
    pub text: String,
}

/// Generation settings sent with every call.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub max_output_tokens: u32,
    pub temperature: Option<f32>,
    /// Ask the model for an `application/json` reply
    pub json_response: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_output_tokens: 8192,
            temperature: None,
            json_response: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// A hosted model that turns a transcript into reply text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(
        &self,
        contents: &[Content],
        options: &GenerateOptions,
    ) -> Result<String, LlmError>;
}
