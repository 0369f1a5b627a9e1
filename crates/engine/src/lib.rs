//! The tutoring engine — the heart of Mentora.
//!
//! One chat turn flows through this crate:
//!
//! 1. **Fetch or create** the session's chat history
//! 2. **Append** the user message
//! 3. **Window** the history to the configured recency cap
//! 4. **Render** a prompt (instruct string or chat message array)
//! 5. **Complete** via the configured inference backend
//! 6. **Append** the assistant reply (or record the failure as a
//!    system message) and return
//!
//! The window filter and renderers are pure functions; all mutable
//! state lives in the session store, and all failure handling
//! concentrates at the completion boundary.

pub mod render;
pub mod session;
pub mod templates;
pub mod turn;
pub mod window;

pub use render::{render_instruct_prompt, render_lesson_prompt, build_chat_messages};
pub use session::SessionStore;
pub use templates::{TemplateStore, DEFAULT_TEMPLATE, LESSON_TEMPLATE};
pub use turn::{ChatEngine, EngineOptions, TurnOutcome};
pub use window::last_n;
