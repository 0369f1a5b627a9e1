//! Turn orchestration.
//!
//! `ChatEngine` owns the two session registries (question-answering and
//! lesson-guided), the template store, and the completion backend, and
//! drives a full tutoring turn through them. The per-session mutex is
//! held for the entire turn, so two concurrent requests for the same
//! session serialize rather than interleave their appends.

use crate::render::{build_chat_messages, render_instruct_prompt, render_lesson_prompt, EOT};
use crate::session::SessionStore;
use crate::templates::{TemplateStore, DEFAULT_TEMPLATE, LESSON_TEMPLATE};
use crate::window::last_n;
use mentora_core::backend::{BackendMode, CompletionBackend, CompletionOptions};
use mentora_core::error::ProviderError;
use mentora_core::lesson::Lesson;
use mentora_core::message::{ChatMessage, Role};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Generation and windowing parameters, fixed at engine construction.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub mode: BackendMode,
    /// Recency cap for the question-answering path.
    pub qa_window: usize,
    /// Recency cap for the lesson-guided path.
    pub guide_window: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            model: "llama-3.3-70b-instruct".into(),
            max_tokens: 5000,
            temperature: 0.5,
            mode: BackendMode::Completion,
            qa_window: 8,
            guide_window: 12,
        }
    }
}

/// The result of one successful turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub content: String,
    /// Wall-clock seconds spent in the completion call.
    pub processing_time: f64,
}

pub struct ChatEngine {
    backend: Arc<dyn CompletionBackend>,
    templates: Arc<TemplateStore>,
    qa_sessions: SessionStore,
    guide_sessions: SessionStore,
    options: EngineOptions,
}

impl ChatEngine {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        templates: Arc<TemplateStore>,
        qa_sessions: SessionStore,
        guide_sessions: SessionStore,
        options: EngineOptions,
    ) -> Self {
        Self {
            backend,
            templates,
            qa_sessions,
            guide_sessions,
            options,
        }
    }

    pub fn qa_sessions(&self) -> &SessionStore {
        &self.qa_sessions
    }

    pub fn guide_sessions(&self) -> &SessionStore {
        &self.guide_sessions
    }

    fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            model: self.options.model.clone(),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            // The end-of-turn delimiter doubles as the stop sequence on
            // raw completions; chat endpoints stop on their own.
            stop: match self.options.mode {
                BackendMode::Completion => vec![EOT.to_string()],
                BackendMode::Chat => vec![],
            },
        }
    }

    async fn complete(
        &self,
        prompt: &str,
        window: &[ChatMessage],
        lesson: Option<&Lesson>,
        user_message: &str,
        template_name: &str,
    ) -> Result<String, ProviderError> {
        let options = self.completion_options();
        match self.options.mode {
            BackendMode::Completion => self.backend.complete_text(prompt, &options).await,
            BackendMode::Chat => {
                let template = self.templates.resolve(template_name).await;
                // The windowed history already ends with the new user
                // turn; drop it so the chat array carries it once.
                let prior = &window[..window.len().saturating_sub(1)];
                let messages = build_chat_messages(&template, lesson, prior, user_message);
                self.backend.complete_chat(&messages, &options).await
            }
        }
    }

    /// Run one question-answering turn for `session_id`.
    ///
    /// On upstream failure the error is recorded into the session log
    /// as a system message and returned; the log never gains an
    /// assistant turn for a failed completion.
    pub async fn qa_turn(
        &self,
        session_id: &str,
        user_message: &str,
    ) -> Result<TurnOutcome, ProviderError> {
        let history = self.qa_sessions.get_or_create(session_id).await;
        let mut log = history.lock().await;
        log.push(Role::User, user_message);

        let window = last_n(log.messages(), self.options.qa_window).to_vec();
        let template = self.templates.resolve(DEFAULT_TEMPLATE).await;
        let prompt = render_instruct_prompt(&template.system_message, None, &window);

        debug!(session = %session_id, window = window.len(), "Rendering qa turn");
        let started = Instant::now();
        match self
            .complete(&prompt, &window, None, user_message, DEFAULT_TEMPLATE)
            .await
        {
            Ok(content) => {
                let processing_time = started.elapsed().as_secs_f64();
                log.push(Role::Assistant, content.clone());
                info!(session = %session_id, secs = processing_time, "Turn completed");
                Ok(TurnOutcome {
                    content,
                    processing_time,
                })
            }
            Err(e) => {
                error!(session = %session_id, error = %e, "Completion failed");
                log.push(Role::System, format!("LLM API error: {e}"));
                Err(e)
            }
        }
    }

    /// Run one lesson-guided turn for `session_id`, grounded in
    /// `lesson`'s content.
    pub async fn guide_turn(
        &self,
        session_id: &str,
        lesson: &Lesson,
        user_message: &str,
    ) -> Result<TurnOutcome, ProviderError> {
        let history = self.guide_sessions.get_or_create(session_id).await;
        let mut log = history.lock().await;
        log.push(Role::User, user_message);

        let window = last_n(log.messages(), self.options.guide_window).to_vec();
        let prompt = render_lesson_prompt(&lesson.content, &window);

        debug!(session = %session_id, lesson = lesson.id, window = window.len(), "Rendering guide turn");
        let started = Instant::now();
        match self
            .complete(&prompt, &window, Some(lesson), user_message, LESSON_TEMPLATE)
            .await
        {
            Ok(content) => {
                let processing_time = started.elapsed().as_secs_f64();
                log.push(Role::Assistant, content.clone());
                info!(session = %session_id, secs = processing_time, "Turn completed");
                Ok(TurnOutcome {
                    content,
                    processing_time,
                })
            }
            Err(e) => {
                error!(session = %session_id, error = %e, "Completion failed");
                log.push(Role::System, format!("LLM API error: {e}"));
                Err(e)
            }
        }
    }

    /// Produce a reply for a persisted conversation.
    ///
    /// `history` is the stored message log including the just-appended
    /// user turn; the caller owns persistence of both the reply and
    /// any failure record.
    pub async fn conversation_reply(
        &self,
        history: &[ChatMessage],
        lesson: Option<&Lesson>,
        template_name: &str,
        user_message: &str,
    ) -> Result<TurnOutcome, ProviderError> {
        let window = last_n(history, self.options.qa_window).to_vec();
        let template = self.templates.resolve(template_name).await;
        let prompt = render_instruct_prompt(&template.system_message, lesson, &window);

        let started = Instant::now();
        let content = self
            .complete(&prompt, &window, lesson, user_message, template_name)
            .await?;
        Ok(TurnOutcome {
            content,
            processing_time: started.elapsed().as_secs_f64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A backend that replays a script of canned results and records
    /// every prompt it was given.
    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<String, ProviderError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl CompletionBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete_text(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<String, ProviderError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok("out of script".into()))
        }

        async fn complete_chat(
            &self,
            messages: &[ChatMessage],
            _options: &CompletionOptions,
        ) -> Result<String, ProviderError> {
            let rendered = messages
                .iter()
                .map(|m| format!("{}: {}", m.role, m.content))
                .collect::<Vec<_>>()
                .join("\n");
            self.prompts.lock().unwrap().push(rendered);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok("out of script".into()))
        }
    }

    fn engine_with(
        backend: Arc<ScriptedBackend>,
        options: EngineOptions,
    ) -> (tempfile::TempDir, ChatEngine) {
        let dir = tempfile::tempdir().unwrap();
        let templates = Arc::new(TemplateStore::open(dir.path().to_path_buf()).unwrap());
        let engine = ChatEngine::new(
            backend,
            templates,
            SessionStore::new(100, "Welcome! Ask me anything about programming."),
            SessionStore::new(100, "Welcome! Let's work through this lesson."),
            options,
        );
        (dir, engine)
    }

    fn lesson() -> Lesson {
        Lesson {
            id: 1,
            title: "Loops".into(),
            content: "A loop repeats a block of code.".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn successful_turn_appends_user_then_assistant() {
        let backend = ScriptedBackend::new(vec![Ok("Hi there".into())]);
        let (_dir, engine) = engine_with(backend.clone(), EngineOptions::default());

        let outcome = engine.qa_turn("s1", "Hello").await.unwrap();
        assert_eq!(outcome.content, "Hi there");
        assert!(outcome.processing_time >= 0.0);

        let log = engine.qa_sessions().history("s1").await;
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].role, Role::Assistant); // welcome seed
        assert_eq!(log[1].role, Role::User);
        assert_eq!(log[1].content, "Hello");
        assert_eq!(log[2].role, Role::Assistant);
        assert_eq!(log[2].content, "Hi there");
    }

    #[tokio::test]
    async fn failed_turn_records_system_message_and_no_assistant() {
        let backend =
            ScriptedBackend::new(vec![Err(ProviderError::Timeout("deadline exceeded".into()))]);
        let (_dir, engine) = engine_with(backend, EngineOptions::default());

        let err = engine.qa_turn("s1", "Hello").await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));

        let log = engine.qa_sessions().history("s1").await;
        assert_eq!(log.len(), 3);
        assert_eq!(log[1].role, Role::User);
        assert_eq!(log[2].role, Role::System);
        assert!(log[2].content.starts_with("LLM API error:"));
    }

    #[tokio::test]
    async fn prompt_sees_only_the_recency_window() {
        let backend = ScriptedBackend::new(vec![]);
        let options = EngineOptions {
            qa_window: 2,
            ..EngineOptions::default()
        };
        let (_dir, engine) = engine_with(backend.clone(), options);

        for i in 0..4 {
            engine.qa_sessions().append("s", Role::User, format!("old {i}")).await;
        }
        engine.qa_turn("s", "newest").await.unwrap();

        // Window of 2 keeps only "old 3" and the new user turn.
        let prompt = backend.last_prompt();
        assert!(prompt.contains("old 3"));
        assert!(prompt.contains("newest"));
        assert!(!prompt.contains("old 2"));
    }

    #[tokio::test]
    async fn recorded_failures_are_not_replayed_upstream() {
        let backend =
            ScriptedBackend::new(vec![
                Err(ProviderError::Timeout("deadline exceeded".into())),
                Ok("recovered".into()),
            ]);
        let (_dir, engine) = engine_with(backend.clone(), EngineOptions::default());

        engine.qa_turn("s1", "first").await.unwrap_err();
        engine.qa_turn("s1", "second").await.unwrap();

        assert!(!backend.last_prompt().contains("LLM API error"));
    }

    #[tokio::test]
    async fn guide_turn_grounds_prompt_in_lesson_content() {
        let backend = ScriptedBackend::new(vec![Ok("A loop repeats.".into())]);
        let (_dir, engine) = engine_with(backend.clone(), EngineOptions::default());

        engine
            .guide_turn("g1", &lesson(), "What is a loop?")
            .await
            .unwrap();

        let prompt = backend.last_prompt();
        assert!(prompt.contains("A loop repeats a block of code."));
        assert!(prompt.contains("user: What is a loop?"));

        let log = engine.guide_sessions().history("g1").await;
        assert_eq!(log.last().unwrap().content, "A loop repeats.");
    }

    #[tokio::test]
    async fn qa_and_guide_sessions_do_not_share_state() {
        let backend = ScriptedBackend::new(vec![Ok("a".into()), Ok("b".into())]);
        let (_dir, engine) = engine_with(backend, EngineOptions::default());

        engine.qa_turn("same-id", "qa question").await.unwrap();
        engine
            .guide_turn("same-id", &lesson(), "guide question")
            .await
            .unwrap();

        let qa = engine.qa_sessions().history("same-id").await;
        let guide = engine.guide_sessions().history("same-id").await;
        assert!(qa.iter().all(|m| m.content != "guide question"));
        assert!(guide.iter().all(|m| m.content != "qa question"));
    }

    #[tokio::test]
    async fn chat_mode_sends_system_history_user_array() {
        let backend = ScriptedBackend::new(vec![Ok("chat reply".into())]);
        let options = EngineOptions {
            mode: BackendMode::Chat,
            ..EngineOptions::default()
        };
        let (_dir, engine) = engine_with(backend.clone(), options);

        engine.qa_turn("c1", "Hello").await.unwrap();

        let rendered = backend.last_prompt();
        assert!(rendered.starts_with("system: "));
        assert!(rendered.ends_with("user: Hello"));
    }

    #[tokio::test]
    async fn chat_mode_guide_turn_carries_lesson_content() {
        let backend = ScriptedBackend::new(vec![Ok("A loop repeats.".into())]);
        let options = EngineOptions {
            mode: BackendMode::Chat,
            ..EngineOptions::default()
        };
        let (_dir, engine) = engine_with(backend.clone(), options);

        engine
            .guide_turn("g1", &lesson(), "What is a loop?")
            .await
            .unwrap();

        let rendered = backend.last_prompt();
        assert!(rendered.starts_with("system: "));
        assert!(rendered.contains("A loop repeats a block of code."));
        assert!(rendered.ends_with("user: What is a loop?"));
    }

    #[tokio::test]
    async fn chat_mode_conversation_reply_carries_lesson_content() {
        let backend = ScriptedBackend::new(vec![Ok("grounded".into())]);
        let options = EngineOptions {
            mode: BackendMode::Chat,
            ..EngineOptions::default()
        };
        let (_dir, engine) = engine_with(backend.clone(), options);

        let history = vec![ChatMessage::user("What is a loop?")];
        engine
            .conversation_reply(&history, Some(&lesson()), "default", "What is a loop?")
            .await
            .unwrap();

        assert!(backend
            .last_prompt()
            .contains("A loop repeats a block of code."));
    }

    #[tokio::test]
    async fn conversation_reply_uses_given_history_and_lesson() {
        let backend = ScriptedBackend::new(vec![Ok("persisted reply".into())]);
        let (_dir, engine) = engine_with(backend.clone(), EngineOptions::default());

        let history = vec![
            ChatMessage::user("Earlier question"),
            ChatMessage::assistant("Earlier answer"),
            ChatMessage::user("What about pointers?"),
        ];
        let outcome = engine
            .conversation_reply(&history, Some(&lesson()), "xyz", "What about pointers?")
            .await
            .unwrap();

        assert_eq!(outcome.content, "persisted reply");
        let prompt = backend.last_prompt();
        assert!(prompt.contains("Earlier question"));
        assert!(prompt.contains("Related lesson: Loops"));
    }
}
