//! HTTP API gateway for Mentora.
//!
//! Exposes the REST surface: account registration and login, the
//! ephemeral QA and lesson-guide chat paths, persisted conversations,
//! lesson and prompt-template management, and a health check.
//!
//! Built on Axum. Everything except `/health`, registration, login,
//! and the session chat paths sits behind bearer-token auth.

pub mod api;
pub mod auth;

use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use mentora_config::AppConfig;
use mentora_core::error::{StorageError, TemplateError};
use mentora_engine::{ChatEngine, EngineOptions, SessionStore, TemplateStore};
use mentora_providers::OpenAiClient;
use mentora_storage::Database;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub engine: Arc<ChatEngine>,
    pub templates: Arc<TemplateStore>,
    pub signer: auth::TokenSigner,
}

pub type SharedState = Arc<AppState>;

/// JSON body carried by every non-2xx response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub(crate) fn storage_error(e: StorageError) -> (StatusCode, Json<ErrorResponse>) {
    match &e {
        StorageError::NotFound { .. } => error(StatusCode::NOT_FOUND, e.to_string()),
        StorageError::AlreadyExists(_) => error(StatusCode::CONFLICT, e.to_string()),
        _ => {
            tracing::error!(error = %e, "Storage operation failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, "Internal storage error")
        }
    }
}

pub(crate) fn template_error(e: TemplateError) -> (StatusCode, Json<ErrorResponse>) {
    match &e {
        TemplateError::NotFound(_) => error(StatusCode::NOT_FOUND, e.to_string()),
        TemplateError::AlreadyExists(_) => error(StatusCode::CONFLICT, e.to_string()),
        TemplateError::Invalid(_) => error(StatusCode::BAD_REQUEST, e.to_string()),
        TemplateError::Storage(_) => {
            tracing::error!(error = %e, "Template storage failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, "Internal template error")
        }
    }
}

/// Build the full router over the shared state.
pub fn build_router(state: SharedState) -> Router {
    let protected = Router::new()
        .route("/auth/logout", post(api::logout))
        .route("/auth/me", get(api::me))
        .route("/chat", post(api::chat))
        .route(
            "/conversations",
            post(api::create_conversation).get(api::list_conversations),
        )
        .route(
            "/conversations/{id}",
            get(api::get_conversation)
                .patch(api::rename_conversation)
                .delete(api::delete_conversation),
        )
        .route("/conversations/{id}/messages", get(api::conversation_messages))
        .route("/lessons", post(api::create_lesson).get(api::list_lessons))
        .route(
            "/lessons/{id}",
            get(api::get_lesson)
                .patch(api::update_lesson)
                .delete(api::delete_lesson),
        )
        .route("/prompts", post(api::create_prompt).get(api::list_prompts))
        .route(
            "/prompts/{name}",
            get(api::get_prompt)
                .patch(api::update_prompt)
                .delete(api::delete_prompt),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let public = Router::new()
        .route("/auth/register", post(api::register))
        .route("/auth/login", post(api::login))
        .route("/qa/{session_id}", post(api::qa_turn))
        .route("/qa/{session_id}/history", get(api::qa_history))
        .route("/guide/{session_id}", post(api::guide_turn))
        .route("/guide/{session_id}/history", get(api::guide_history));

    let cors_origin = state
        .config
        .server
        .cors_origin
        .parse()
        .unwrap_or_else(|_| axum::http::HeaderValue::from_static("http://localhost:8080"));
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::exact(cors_origin))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", public.merge(protected))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Assemble the state from configuration: database, template store,
/// inference client, and chat engine.
pub async fn build_state(config: AppConfig) -> Result<SharedState, Box<dyn std::error::Error>> {
    let db = Database::open(&config.database.path).await?;
    let templates = Arc::new(TemplateStore::open(config.chat.templates_dir.clone())?);

    let client = OpenAiClient::new(
        &config.llm.api_url,
        config.llm.api_key.clone(),
        config.llm.timeout_secs,
    )?;

    let engine = Arc::new(ChatEngine::new(
        Arc::new(client),
        templates.clone(),
        SessionStore::new(config.chat.session_capacity, config.chat.qa_welcome.clone()),
        SessionStore::new(
            config.chat.session_capacity,
            config.chat.guide_welcome.clone(),
        ),
        EngineOptions {
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            mode: config.llm.mode,
            qa_window: config.chat.qa_window,
            guide_window: config.chat.guide_window,
        },
    ));

    let signer = match &config.auth.token_secret {
        Some(secret) => auth::TokenSigner::new(secret.as_bytes(), config.auth.token_ttl_minutes),
        None => {
            warn!("No auth.token_secret configured, issued tokens will not survive a restart");
            auth::TokenSigner::new(auth::TokenSigner::random_secret(), config.auth.token_ttl_minutes)
        }
    };

    Ok(Arc::new(AppState {
        config,
        db,
        engine,
        templates,
        signer,
    }))
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_state(config).await?;
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
