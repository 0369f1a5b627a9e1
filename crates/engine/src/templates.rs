//! Prompt template store — named JSON documents on disk.
//!
//! Each template lives at `<templates_dir>/<name>.json` with the shape
//! `{ "system_message": "...", "examples": [{role, content}, ...] }`.
//! Documents are parsed and validated into `PromptTemplate` at load
//! time; corrupted files are skipped with a warning. All templates are
//! cached in memory and flushed to disk on every mutation.
//!
//! Lookup is lenient by design: an unknown name resolves to the
//! `default` template (and, failing that, to a built-in fallback)
//! rather than producing an error.

use mentora_core::error::TemplateError;
use mentora_core::template::PromptTemplate;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Name of the template every unknown lookup falls back to.
pub const DEFAULT_TEMPLATE: &str = "default";

/// Name of the template the lesson-guided path resolves in chat mode.
/// Deployments override the built-in fallback by storing a document
/// under this name.
pub const LESSON_TEMPLATE: &str = "lesson";

/// System message used when not even a `default` document exists on disk.
const BUILTIN_SYSTEM_MESSAGE: &str = "\
You are an AI tutor teaching programming to students. Guide them step by \
step so they discover answers on their own instead of receiving direct \
solutions: suggest one idea at a time, keep hinting when they struggle, \
and only give a full solution after repeated failed attempts. Use simple, \
friendly language, praise effort, explain mistakes with examples, keep \
every response as short as possible, and politely decline questions that \
are not about programming.";

pub struct TemplateStore {
    dir: PathBuf,
    templates: RwLock<HashMap<String, PromptTemplate>>,
}

impl TemplateStore {
    /// Open a store over `dir`, creating the directory if needed and
    /// loading every `*.json` document inside it.
    pub fn open(dir: PathBuf) -> Result<Self, TemplateError> {
        std::fs::create_dir_all(&dir)
            .map_err(|e| TemplateError::Storage(format!("create templates dir: {e}")))?;

        let mut templates = HashMap::new();
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| TemplateError::Storage(format!("read templates dir: {e}")))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match std::fs::read_to_string(&path)
                .map_err(|e| TemplateError::Storage(e.to_string()))
                .and_then(|raw| PromptTemplate::from_json(&raw))
            {
                Ok(template) => {
                    templates.insert(name.to_string(), template);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping invalid template document");
                }
            }
        }

        debug!(dir = %dir.display(), count = templates.len(), "Template store loaded");
        Ok(Self {
            dir,
            templates: RwLock::new(templates),
        })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Get a template by exact name.
    pub async fn get(&self, name: &str) -> Option<PromptTemplate> {
        self.templates.read().await.get(name).cloned()
    }

    /// Resolve a template name with fallback: the named template if it
    /// exists, otherwise `default`, otherwise the built-in tutor
    /// template. Never fails.
    pub async fn resolve(&self, name: &str) -> PromptTemplate {
        let templates = self.templates.read().await;
        templates
            .get(name)
            .or_else(|| templates.get(DEFAULT_TEMPLATE))
            .cloned()
            .unwrap_or_else(|| PromptTemplate {
                system_message: BUILTIN_SYSTEM_MESSAGE.into(),
                examples: vec![],
            })
    }

    /// Names of all stored templates.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Create a new named template. Fails if the name is taken.
    pub async fn create(
        &self,
        name: &str,
        template: PromptTemplate,
    ) -> Result<(), TemplateError> {
        let mut templates = self.templates.write().await;
        if templates.contains_key(name) {
            return Err(TemplateError::AlreadyExists(name.to_string()));
        }
        self.write_document(name, &template)?;
        templates.insert(name.to_string(), template);
        Ok(())
    }

    /// Update fields of an existing template. `None` leaves a field
    /// unchanged.
    pub async fn update(
        &self,
        name: &str,
        system_message: Option<String>,
        examples: Option<Vec<mentora_core::message::ChatMessage>>,
    ) -> Result<PromptTemplate, TemplateError> {
        let mut templates = self.templates.write().await;
        let Some(existing) = templates.get(name) else {
            return Err(TemplateError::NotFound(name.to_string()));
        };

        let mut updated = existing.clone();
        if let Some(system_message) = system_message {
            if system_message.trim().is_empty() {
                return Err(TemplateError::Invalid(
                    "system_message must not be empty".into(),
                ));
            }
            updated.system_message = system_message;
        }
        if let Some(examples) = examples {
            updated.examples = examples;
        }

        self.write_document(name, &updated)?;
        templates.insert(name.to_string(), updated.clone());
        Ok(updated)
    }

    /// Delete a named template from the cache and from disk.
    pub async fn delete(&self, name: &str) -> Result<(), TemplateError> {
        let mut templates = self.templates.write().await;
        if templates.remove(name).is_none() {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        let path = self.path_for(name);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| TemplateError::Storage(format!("remove {}: {e}", path.display())))?;
        }
        Ok(())
    }

    fn write_document(&self, name: &str, template: &PromptTemplate) -> Result<(), TemplateError> {
        let raw = serde_json::to_string_pretty(template)
            .map_err(|e| TemplateError::Storage(format!("serialize template: {e}")))?;
        std::fs::write(self.path_for(name), raw)
            .map_err(|e| TemplateError::Storage(format!("write template {name}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentora_core::message::ChatMessage;

    fn store() -> (tempfile::TempDir, TemplateStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TemplateStore::open(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    fn template(text: &str) -> PromptTemplate {
        PromptTemplate {
            system_message: text.into(),
            examples: vec![],
        }
    }

    #[tokio::test]
    async fn create_get_list_delete() {
        let (_dir, store) = store();
        store.create("lesson", template("Teach the lesson.")).await.unwrap();

        assert_eq!(
            store.get("lesson").await.unwrap().system_message,
            "Teach the lesson."
        );
        assert_eq!(store.list().await, vec!["lesson".to_string()]);

        store.delete("lesson").await.unwrap();
        assert!(store.get("lesson").await.is_none());
    }

    #[tokio::test]
    async fn create_rejects_duplicate_name() {
        let (_dir, store) = store();
        store.create("t", template("a")).await.unwrap();
        let err = store.create("t", template("b")).await.unwrap_err();
        assert!(matches!(err, TemplateError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn unknown_name_falls_back_to_default() {
        let (_dir, store) = store();
        store
            .create(DEFAULT_TEMPLATE, template("The default instruction."))
            .await
            .unwrap();

        let resolved = store.resolve("xyz").await;
        assert_eq!(resolved.system_message, "The default instruction.");
    }

    #[tokio::test]
    async fn resolve_without_any_documents_uses_builtin() {
        let (_dir, store) = store();
        let resolved = store.resolve("xyz").await;
        assert!(resolved.system_message.contains("AI tutor"));
    }

    #[tokio::test]
    async fn documents_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = TemplateStore::open(dir.path().to_path_buf()).unwrap();
            store
                .create(
                    "fewshot",
                    PromptTemplate {
                        system_message: "sys".into(),
                        examples: vec![
                            ChatMessage::user("q"),
                            ChatMessage::assistant("a"),
                        ],
                    },
                )
                .await
                .unwrap();
        }

        let reloaded = TemplateStore::open(dir.path().to_path_buf()).unwrap();
        let template = reloaded.get("fewshot").await.unwrap();
        assert_eq!(template.examples.len(), 2);
    }

    #[tokio::test]
    async fn invalid_documents_are_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(
            dir.path().join("ok.json"),
            r#"{"system_message": "fine"}"#,
        )
        .unwrap();

        let store = TemplateStore::open(dir.path().to_path_buf()).unwrap();
        assert_eq!(store.list().await, vec!["ok".to_string()]);
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let (_dir, store) = store();
        store.create("t", template("old")).await.unwrap();

        let updated = store
            .update("t", Some("new".into()), None)
            .await
            .unwrap();
        assert_eq!(updated.system_message, "new");
        assert!(updated.examples.is_empty());

        let err = store.update("missing", Some("x".into()), None).await.unwrap_err();
        assert!(matches!(err, TemplateError::NotFound(_)));
    }
}
