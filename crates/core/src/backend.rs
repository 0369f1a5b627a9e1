//! CompletionBackend trait — the abstraction over the inference endpoint.
//!
//! A backend knows how to send a rendered prompt (or a chat message
//! array) to an external completion API and extract the generated
//! text. The engine calls it without knowing which wire format is in
//! use; the mode is selected by configuration, not by code paths.

use crate::error::ProviderError;
use crate::message::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which upstream API shape to use for a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    /// Raw text completion (`/completions`): single rendered prompt
    /// string with delimiter tokens, response in `choices[0].text`.
    #[default]
    Completion,
    /// Chat completion (`/chat/completions`): role/content message
    /// array, response in `choices[0].message.content`.
    Chat,
}

impl std::str::FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completion" => Ok(BackendMode::Completion),
            "chat" => Ok(BackendMode::Chat),
            other => Err(format!(
                "unknown backend mode '{other}' (expected 'completion' or 'chat')"
            )),
        }
    }
}

/// Per-request generation parameters.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Stop sequences, e.g. the end-of-turn delimiter for instruct models.
    pub stop: Vec<String>,
}

/// The inference client boundary.
///
/// On transport failure, timeout, or a non-2xx status the backend
/// returns a `ProviderError`; recording that failure into the
/// conversation log is the caller's responsibility.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// A human-readable name for this backend (e.g. "openai-compat").
    fn name(&self) -> &str;

    /// Send a rendered prompt string, return the generated text.
    async fn complete_text(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> std::result::Result<String, ProviderError>;

    /// Send a chat message array, return the generated text.
    async fn complete_chat(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> std::result::Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_mode_parses() {
        assert_eq!(
            "completion".parse::<BackendMode>().unwrap(),
            BackendMode::Completion
        );
        assert_eq!("chat".parse::<BackendMode>().unwrap(), BackendMode::Chat);
        assert!("sse".parse::<BackendMode>().is_err());
    }

    #[test]
    fn backend_mode_serde_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&BackendMode::Completion).unwrap(),
            "\"completion\""
        );
    }
}
