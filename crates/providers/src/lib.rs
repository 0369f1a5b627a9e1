//! Inference API clients.
//!
//! One client ships today: `OpenAiClient`, which speaks the
//! OpenAI-compatible wire format used by OpenAI, OpenRouter, Ollama,
//! vLLM, Together AI, and most self-hosted inference servers. It
//! implements both request shapes behind `CompletionBackend`: raw
//! `/completions` for delimiter-rendered instruct prompts and
//! `/chat/completions` for message arrays.

pub mod openai;

pub use openai::OpenAiClient;
