//! REST handlers for the Mentora API.
//!
//! Auth, session chat (qa and lesson-guide), persisted conversations,
//! lessons, and prompt templates. All handlers return JSON; failures
//! use the shared `ErrorResponse` body.

use crate::auth::{self, CurrentUser};
use crate::{error, storage_error, template_error, ErrorResponse, SharedState};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::Extension;
use chrono::{DateTime, Utc};
use mentora_core::error::ProviderError;
use mentora_core::lesson::Lesson;
use mentora_core::message::{ChatMessage, Role};
use mentora_core::template::PromptTemplate;
use mentora_storage::{Conversation, StoredMessage, User};
use serde::{Deserialize, Serialize};
use tracing::info;

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn provider_error(e: ProviderError) -> ApiError {
    error(StatusCode::BAD_GATEWAY, format!("LLM API error: {e}"))
}

// --- Auth ---

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

pub async fn register(
    State(state): State<SharedState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    if req.username.trim().is_empty() || req.email.trim().is_empty() {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "username and email must not be empty",
        ));
    }
    if req.password.len() < 8 {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "password must be at least 8 characters",
        ));
    }

    if state
        .db
        .get_user_by_username(&req.username)
        .await
        .map_err(storage_error)?
        .is_some()
    {
        return Err(error(StatusCode::CONFLICT, "Username already registered"));
    }
    if state
        .db
        .get_user_by_email(&req.email)
        .await
        .map_err(storage_error)?
        .is_some()
    {
        return Err(error(StatusCode::CONFLICT, "Email already registered"));
    }

    let hashed = auth::hash_password(&req.password);
    let user = state
        .db
        .create_user(&req.username, &req.email, req.full_name.as_deref(), &hashed)
        .await
        .map_err(storage_error)?;

    info!(username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

pub async fn login(
    State(state): State<SharedState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<TokenResponse> {
    let invalid = || error(StatusCode::UNAUTHORIZED, "Invalid credentials");

    let user = state
        .db
        .get_user_by_username(&req.username)
        .await
        .map_err(storage_error)?
        .ok_or_else(invalid)?;

    if !auth::verify_password(&req.password, &user.hashed_password) {
        return Err(invalid());
    }
    if !user.is_active {
        return Err(error(StatusCode::FORBIDDEN, "Inactive user"));
    }

    let (token, expires_at) = state.signer.issue(user.id);
    state
        .db
        .store_token(&token, user.id, expires_at)
        .await
        .map_err(storage_error)?;

    info!(username = %user.username, "User logged in");
    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer",
        expires_at,
    }))
}

#[derive(Serialize)]
pub struct DetailResponse {
    pub detail: &'static str,
}

pub async fn logout(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<DetailResponse> {
    state
        .db
        .revoke_token(&current.token)
        .await
        .map_err(storage_error)?;
    info!(username = %current.user.username, "User logged out");
    Ok(Json(DetailResponse {
        detail: "Logged out",
    }))
}

pub async fn me(Extension(current): Extension<CurrentUser>) -> Json<User> {
    Json(current.user)
}

// --- Session chat ---

#[derive(Deserialize)]
pub struct TurnRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub content: String,
    pub processing_time: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub messages: Vec<ChatMessage>,
}

pub async fn qa_turn(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Json(req): Json<TurnRequest>,
) -> ApiResult<MessageResponse> {
    let outcome = state
        .engine
        .qa_turn(&session_id, &req.content)
        .await
        .map_err(provider_error)?;
    Ok(Json(MessageResponse {
        content: outcome.content,
        processing_time: outcome.processing_time,
        timestamp: Utc::now(),
    }))
}

pub async fn qa_history(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Json<HistoryResponse> {
    let messages = state.engine.qa_sessions().history(&session_id).await;
    Json(HistoryResponse {
        session_id,
        messages,
    })
}

#[derive(Deserialize)]
pub struct GuideTurnRequest {
    pub lesson_id: i64,
    pub content: String,
}

pub async fn guide_turn(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
    Json(req): Json<GuideTurnRequest>,
) -> ApiResult<MessageResponse> {
    let lesson = state
        .db
        .get_lesson(req.lesson_id)
        .await
        .map_err(storage_error)?;

    let outcome = state
        .engine
        .guide_turn(&session_id, &lesson, &req.content)
        .await
        .map_err(provider_error)?;
    Ok(Json(MessageResponse {
        content: outcome.content,
        processing_time: outcome.processing_time,
        timestamp: Utc::now(),
    }))
}

pub async fn guide_history(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> Json<HistoryResponse> {
    let messages = state.engine.guide_sessions().history(&session_id).await;
    Json(HistoryResponse {
        session_id,
        messages,
    })
}

// --- Persisted chat ---

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<i64>,
    #[serde(default)]
    pub lesson_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct ChatQuery {
    pub template: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub conversation_id: i64,
    pub response: String,
}

/// Title for a lazily created conversation: the first words of the
/// opening message, truncated.
fn conversation_title(message: &str) -> String {
    const MAX_CHARS: usize = 40;
    let trimmed = message.trim();
    if trimmed.chars().count() <= MAX_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX_CHARS).collect();
        format!("{cut}...")
    }
}

async fn owned_conversation(
    state: &SharedState,
    user_id: i64,
    id: i64,
) -> Result<Conversation, ApiError> {
    let conv = state.db.get_conversation(id).await.map_err(storage_error)?;
    // Hide other users' conversations rather than admitting they exist.
    if conv.user_id != user_id {
        return Err(error(
            StatusCode::NOT_FOUND,
            format!("conversation not found: {id}"),
        ));
    }
    Ok(conv)
}

pub async fn chat(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ChatQuery>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let conv = match req.conversation_id {
        Some(id) => owned_conversation(&state, current.user.id, id).await?,
        None => {
            if let Some(lesson_id) = req.lesson_id {
                state.db.get_lesson(lesson_id).await.map_err(storage_error)?;
            }
            state
                .db
                .create_conversation(
                    current.user.id,
                    &conversation_title(&req.message),
                    req.lesson_id,
                    query.template.as_deref().unwrap_or("default"),
                )
                .await
                .map_err(storage_error)?
        }
    };

    state
        .db
        .add_message(conv.id, Role::User, &req.message)
        .await
        .map_err(storage_error)?;

    let history: Vec<ChatMessage> = state
        .db
        .get_messages(conv.id)
        .await
        .map_err(storage_error)?
        .iter()
        .map(|m| ChatMessage {
            role: m.role,
            content: m.content.clone(),
        })
        .collect();

    let lesson: Option<Lesson> = match conv.lesson_id {
        Some(id) => state.db.get_lesson(id).await.ok(),
        None => None,
    };

    let template_name = query.template.as_deref().unwrap_or(&conv.template_name);
    match state
        .engine
        .conversation_reply(&history, lesson.as_ref(), template_name, &req.message)
        .await
    {
        Ok(outcome) => {
            state
                .db
                .add_message(conv.id, Role::Assistant, &outcome.content)
                .await
                .map_err(storage_error)?;
            Ok(Json(ChatResponse {
                conversation_id: conv.id,
                response: outcome.content,
            }))
        }
        Err(e) => {
            // Keep the failure in the conversation log, as a system turn.
            state
                .db
                .add_message(conv.id, Role::System, &format!("LLM API error: {e}"))
                .await
                .map_err(storage_error)?;
            Err(provider_error(e))
        }
    }
}

// --- Conversations ---

#[derive(Deserialize)]
pub struct CreateConversationRequest {
    pub title: String,
    #[serde(default)]
    pub lesson_id: Option<i64>,
    #[serde(default)]
    pub template_name: Option<String>,
}

pub async fn create_conversation(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    if let Some(lesson_id) = req.lesson_id {
        state.db.get_lesson(lesson_id).await.map_err(storage_error)?;
    }
    let conv = state
        .db
        .create_conversation(
            current.user.id,
            &req.title,
            req.lesson_id,
            req.template_name.as_deref().unwrap_or("default"),
        )
        .await
        .map_err(storage_error)?;
    Ok((StatusCode::CREATED, Json(conv)))
}

pub async fn list_conversations(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Vec<Conversation>> {
    let conversations = state
        .db
        .list_conversations(current.user.id)
        .await
        .map_err(storage_error)?;
    Ok(Json(conversations))
}

pub async fn get_conversation(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Conversation> {
    let conv = owned_conversation(&state, current.user.id, id).await?;
    Ok(Json(conv))
}

#[derive(Deserialize)]
pub struct RenameConversationRequest {
    pub title: String,
}

pub async fn rename_conversation(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<RenameConversationRequest>,
) -> ApiResult<Conversation> {
    owned_conversation(&state, current.user.id, id).await?;
    let conv = state
        .db
        .rename_conversation(id, &req.title)
        .await
        .map_err(storage_error)?;
    Ok(Json(conv))
}

pub async fn delete_conversation(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    owned_conversation(&state, current.user.id, id).await?;
    state
        .db
        .delete_conversation(id)
        .await
        .map_err(storage_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn conversation_messages(
    State(state): State<SharedState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<StoredMessage>> {
    owned_conversation(&state, current.user.id, id).await?;
    let messages = state.db.get_messages(id).await.map_err(storage_error)?;
    Ok(Json(messages))
}

// --- Lessons ---

#[derive(Deserialize)]
pub struct CreateLessonRequest {
    pub title: String,
    pub content: String,
}

pub async fn create_lesson(
    State(state): State<SharedState>,
    Json(req): Json<CreateLessonRequest>,
) -> Result<(StatusCode, Json<Lesson>), ApiError> {
    if req.title.trim().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "title must not be empty"));
    }
    let lesson = state
        .db
        .create_lesson(&req.title, &req.content)
        .await
        .map_err(storage_error)?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

#[derive(Deserialize)]
pub struct LessonListQuery {
    #[serde(default)]
    pub q: Option<String>,
}

pub async fn list_lessons(
    State(state): State<SharedState>,
    Query(query): Query<LessonListQuery>,
) -> ApiResult<Vec<Lesson>> {
    let lessons = match query.q.as_deref() {
        Some(q) if !q.trim().is_empty() => {
            state.db.search_lessons(q).await.map_err(storage_error)?
        }
        _ => state.db.list_lessons().await.map_err(storage_error)?,
    };
    Ok(Json(lessons))
}

pub async fn get_lesson(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> ApiResult<Lesson> {
    let lesson = state.db.get_lesson(id).await.map_err(storage_error)?;
    Ok(Json(lesson))
}

#[derive(Deserialize)]
pub struct UpdateLessonRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

pub async fn update_lesson(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateLessonRequest>,
) -> ApiResult<Lesson> {
    let lesson = state
        .db
        .update_lesson(id, req.title.as_deref(), req.content.as_deref())
        .await
        .map_err(storage_error)?;
    Ok(Json(lesson))
}

pub async fn delete_lesson(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.db.delete_lesson(id).await.map_err(storage_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Prompt templates ---

#[derive(Deserialize)]
pub struct CreatePromptRequest {
    pub name: String,
    pub system_message: String,
    #[serde(default)]
    pub examples: Vec<ChatMessage>,
}

#[derive(Serialize)]
pub struct PromptResponse {
    pub name: String,
    pub system_message: String,
    pub examples: Vec<ChatMessage>,
}

fn prompt_response(name: &str, template: PromptTemplate) -> PromptResponse {
    PromptResponse {
        name: name.to_string(),
        system_message: template.system_message,
        examples: template.examples,
    }
}

pub async fn create_prompt(
    State(state): State<SharedState>,
    Json(req): Json<CreatePromptRequest>,
) -> Result<(StatusCode, Json<PromptResponse>), ApiError> {
    if req.name.trim().is_empty()
        || !req
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "name must be non-empty and contain only letters, digits, '-' or '_'",
        ));
    }
    if req.system_message.trim().is_empty() {
        return Err(error(
            StatusCode::BAD_REQUEST,
            "system_message must not be empty",
        ));
    }

    let template = PromptTemplate {
        system_message: req.system_message,
        examples: req.examples,
    };
    state
        .templates
        .create(&req.name, template.clone())
        .await
        .map_err(template_error)?;
    Ok((StatusCode::CREATED, Json(prompt_response(&req.name, template))))
}

#[derive(Serialize)]
pub struct PromptListResponse {
    pub prompts: Vec<String>,
}

pub async fn list_prompts(State(state): State<SharedState>) -> Json<PromptListResponse> {
    Json(PromptListResponse {
        prompts: state.templates.list().await,
    })
}

pub async fn get_prompt(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult<PromptResponse> {
    let template = state
        .templates
        .get(&name)
        .await
        .ok_or_else(|| error(StatusCode::NOT_FOUND, format!("Template not found: {name}")))?;
    Ok(Json(prompt_response(&name, template)))
}

#[derive(Deserialize)]
pub struct UpdatePromptRequest {
    #[serde(default)]
    pub system_message: Option<String>,
    #[serde(default)]
    pub examples: Option<Vec<ChatMessage>>,
}

pub async fn update_prompt(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Json(req): Json<UpdatePromptRequest>,
) -> ApiResult<PromptResponse> {
    let template = state
        .templates
        .update(&name, req.system_message, req.examples)
        .await
        .map_err(template_error)?;
    Ok(Json(prompt_response(&name, template)))
}

pub async fn delete_prompt(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.templates.delete(&name).await.map_err(template_error)?;
    Ok(StatusCode::NO_CONTENT)
}
