//! Prompt template domain type.
//!
//! Templates are named, persisted JSON documents supplying the system
//! instruction (and optional few-shot examples) used when rendering a
//! prompt. They are parsed into this typed record at load time rather
//! than being poked at as untyped JSON during a request.

use crate::error::TemplateError;
use crate::message::ChatMessage;
use serde::{Deserialize, Serialize};

/// A named prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// The system instruction. Required; an empty string is rejected
    /// at load time.
    pub system_message: String,

    /// Optional few-shot examples, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<ChatMessage>,
}

impl PromptTemplate {
    /// Parse and validate a template from its on-disk JSON document.
    pub fn from_json(raw: &str) -> Result<Self, TemplateError> {
        let template: PromptTemplate =
            serde_json::from_str(raw).map_err(|e| TemplateError::Invalid(e.to_string()))?;
        if template.system_message.trim().is_empty() {
            return Err(TemplateError::Invalid(
                "system_message must not be empty".into(),
            ));
        }
        Ok(template)
    }

    /// Substitute `{key}` placeholders in the system message.
    ///
    /// Unknown placeholders are left untouched; substitution is plain
    /// string replacement, applied once per variable.
    pub fn format_system_message(&self, vars: &[(&str, &str)]) -> String {
        let mut out = self.system_message.clone();
        for (key, value) in vars {
            out = out.replace(&format!("{{{key}}}"), value);
        }
        out
    }
}
