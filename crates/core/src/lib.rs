//! Core domain types and traits for Mentora.
//!
//! This crate defines the value objects that flow through the whole
//! system (messages, chat histories, lessons, prompt templates), the
//! `CompletionBackend` trait that abstracts over the inference
//! endpoint, and the error taxonomy shared by every other crate.

pub mod backend;
pub mod error;
pub mod lesson;
pub mod message;
pub mod template;

pub use backend::{BackendMode, CompletionBackend, CompletionOptions};
pub use error::{AuthError, Error, ProviderError, Result, StorageError, TemplateError};
pub use lesson::Lesson;
pub use message::{ChatHistory, ChatMessage, Role};
pub use template::PromptTemplate;
