//! Prompt renderers.
//!
//! Three render paths share one rule: rendering is a total, pure
//! function of its explicit inputs. No history, an empty lesson, or an
//! empty system text all render to well-defined output with the fixed
//! markers still in place.
//!
//! - `render_instruct_prompt` — the raw-completion grammar for
//!   Llama-3-style instruct models, with role-delimited segments.
//! - `render_lesson_prompt` — the lesson-grounded template with a
//!   `role: content` history block.
//! - `build_chat_messages` — the chat-completions shape: system
//!   message first, prior history verbatim, new user turn last.

use mentora_core::lesson::Lesson;
use mentora_core::message::{ChatMessage, Role};
use mentora_core::template::PromptTemplate;

/// Start-of-prompt marker.
pub const BEGIN_OF_TEXT: &str = "<|begin_of_text|>";
/// End-of-turn marker; also used as the stop sequence on requests.
pub const EOT: &str = "<|eot_id|>";

fn header(role: &str) -> String {
    format!("<|start_header_id|>{role}<|end_header_id|>")
}

/// Render the delimiter-variant instruct prompt.
///
/// Layout: system header with the template's system text (plus the
/// lesson block when supplied), a conversation-history section of
/// role-delimited turns, a response anchor, a repeat of the latest
/// user turn, and a trailing assistant header where generation starts.
/// System-role messages in the history (recorded upstream failures)
/// are not replayed to the model.
pub fn render_instruct_prompt(
    system_text: &str,
    lesson: Option<&Lesson>,
    history: &[ChatMessage],
) -> String {
    let mut system = system_text.to_string();
    if let Some(lesson) = lesson {
        system.push_str(&format!(
            "\nRelated lesson: {}\n{}\n",
            lesson.title, lesson.content
        ));
    }

    let mut turns = String::new();
    for msg in history {
        match msg.role {
            Role::User => {
                turns.push_str(&format!("{EOT}{}\n{}\n", header("user"), msg.content));
            }
            Role::Assistant => {
                turns.push_str(&format!("{EOT}{}\n{}\n", header("assistant"), msg.content));
            }
            Role::System => {}
        }
    }

    let mut prompt = format!("{BEGIN_OF_TEXT}{}\n", header("system"));
    prompt.push_str(&system);
    prompt.push_str("\n### **Conversation History:**\n");
    prompt.push_str(&turns);
    prompt.push_str("### **Response:**\n");

    // Repeat the latest user turn right before the response anchor.
    if let Some(last) = history.last()
        && last.role == Role::User
    {
        prompt.push_str(&format!("{EOT}{}\n{}\n", header("user"), last.content));
    }

    prompt.push_str(&format!("{EOT}{}\n", header("assistant")));
    prompt
}

/// The built-in lesson-grounded system template. `{context}` and
/// `{history}` are filled by `render_lesson_prompt`.
const LESSON_TEMPLATE: &str = "\
<|begin_of_text|><|start_header_id|>system<|end_header_id|>
You are a programming tutor who answers the student's questions concisely \
and encouragingly, strictly based on the lesson content below. Decline \
questions whose answer would require knowledge outside the lesson and guide \
the student back to it. Keep every response as short as possible, track the \
conversation history for continuity, and rephrase rather than repeat when \
the student did not understand an earlier explanation.

### Lesson Content: {context}

### Conversation History: {history}

### Response:
<|eot_id|><|start_header_id|>user<|end_header_id|>
<|eot_id|><|start_header_id|>assistant<|end_header_id|>
";

/// Render the lesson-grounded prompt (simple variant).
///
/// The history block serializes each message as `role: content`
/// joined by newlines; an empty history renders as an empty block
/// with the template markers still emitted.
pub fn render_lesson_prompt(context: &str, history: &[ChatMessage]) -> String {
    let lines: Vec<String> = history
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect();
    LESSON_TEMPLATE
        .replace("{context}", context)
        .replace("{history}", &lines.join("\n"))
}

/// Build the chat-completions message array from a resolved template.
///
/// Order: formatted system message first, prior history verbatim,
/// then the new user turn appended last. A supplied lesson fills the
/// template's `{lesson_title}`/`{lesson_content}` placeholders; when
/// the template declares neither, the lesson is appended to the system
/// message as the same block the instruct renderer emits.
pub fn build_chat_messages(
    template: &PromptTemplate,
    lesson: Option<&Lesson>,
    history: &[ChatMessage],
    user_message: &str,
) -> Vec<ChatMessage> {
    let vars: Vec<(&str, &str)> = match lesson {
        Some(l) => vec![
            ("lesson_title", l.title.as_str()),
            ("lesson_content", l.content.as_str()),
        ],
        None => vec![],
    };
    let mut system = template.format_system_message(&vars);
    if let Some(l) = lesson
        && !template.system_message.contains("{lesson_content}")
    {
        system.push_str(&format!("\nRelated lesson: {}\n{}\n", l.title, l.content));
    }

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system));
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(user_message));
    messages
}
