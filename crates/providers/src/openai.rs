//! OpenAI-compatible inference client.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, and any
//! server exposing the OpenAI wire format. `complete_text` posts to
//! `/completions` (raw instruct prompts), `complete_chat` posts to
//! `/chat/completions` (role/content arrays). The same status mapping
//! applies to both: 401/403 become authentication failures, transport
//! timeouts become `Timeout`, any other non-200 surfaces the body.

use async_trait::async_trait;
use mentora_core::backend::{CompletionBackend, CompletionOptions};
use mentora_core::error::ProviderError;
use mentora_core::message::ChatMessage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A client for an OpenAI-compatible completion endpoint.
pub struct OpenAiClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client for `base_url` with the given request timeout.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ProviderError::Network(format!("build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn request(&self, url: &str, body: &serde_json::Value) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        req
    }

    async fn send(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self.request(url, body).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Inference endpoint returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }
        Ok(response)
    }

    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: m.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn complete_text(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": options.model,
            "prompt": prompt,
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
        });
        if !options.stop.is_empty() {
            body["stop"] = serde_json::json!(options.stop);
        }

        debug!(model = %options.model, prompt_len = prompt.len(), "Sending completion request");

        let response = self.send(&url, &body).await?;
        let api_response: CompletionResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let text = api_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| ProviderError::EmptyCompletion("No choices in response".into()))?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::EmptyCompletion(
                "Model returned empty text".into(),
            ));
        }
        Ok(text)
    }

    async fn complete_chat(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": options.model,
            "messages": Self::to_api_messages(messages),
            "max_tokens": options.max_tokens,
            "temperature": options.temperature,
        });
        if !options.stop.is_empty() {
            body["stop"] = serde_json::json!(options.stop);
        }

        debug!(model = %options.model, messages = messages.len(), "Sending chat completion request");

        let response = self.send(&url, &body).await?;
        let api_response: ChatResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.map(|m| m.content))
            .ok_or_else(|| ProviderError::EmptyCompletion("No choices in response".into()))?;

        let content = content.trim().to_string();
        if content.is_empty() {
            return Err(ProviderError::EmptyCompletion(
                "Model returned empty message".into(),
            ));
        }
        Ok(content)
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentora_core::message::Role;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = OpenAiClient::new("http://localhost:8001/v1/", None, 120).unwrap();
        assert_eq!(client.base_url, "http://localhost:8001/v1");
    }

    #[test]
    fn message_conversion_uses_lowercase_roles() {
        let messages = vec![
            ChatMessage::system("be helpful"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
        ];
        let api = OpenAiClient::to_api_messages(&messages);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[2].role, "assistant");
        assert_eq!(api[1].content, "hello");
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{
            "id": "cmpl-1",
            "object": "text_completion",
            "model": "llama-3.3-70b-instruct",
            "choices": [{"text": "\nA pointer stores an address.\n", "index": 0, "finish_reason": "stop"}]
        }"#;
        let parsed: CompletionResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].text.trim(), "A pointer stores an address.");
    }

    #[test]
    fn parse_chat_response() {
        let data = r#"{
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi there"}, "finish_reason": "stop"}]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(data).unwrap();
        assert_eq!(
            parsed.choices[0].message.as_ref().unwrap().content,
            "Hi there"
        );
    }

    #[test]
    fn parse_completion_response_without_choices() {
        let parsed: CompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(parsed.choices.is_empty());
    }
}
