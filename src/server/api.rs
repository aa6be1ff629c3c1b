//! HTTP API server implementation

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::config::TranslatorConfig;
use crate::core::errors::TranslationError;
use crate::core::models::{ChatConfig, ChatId, ChatStats, Engine, GlobalStats};
use crate::core::service::{EngineInfo, ServedTranslation, TranslationService};

/// Application state
#[derive(Clone)]
pub struct AppState {
    service: Arc<TranslationService>,
    /// Config file the process started with, re-read on reload
    config_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(service: Arc<TranslationService>, config_path: Option<PathBuf>) -> Self {
        Self {
            service,
            config_path,
        }
    }
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
}

#[derive(Serialize)]
struct EnginesResponse {
    object: String,
    data: Vec<EngineInfo>,
}

#[derive(Serialize)]
struct PingResponse {
    engine: String,
    latency_ms: u64,
}

/// Translation request body
#[derive(Deserialize)]
pub struct TranslateBody {
    pub user_id: i64,
    pub chat_id: ChatId,
    pub text: String,
    pub target_lang: Option<String>,
    pub source_lang: Option<String>,
    pub engine: Option<String>,
    pub model: Option<String>,
}

#[derive(Serialize)]
struct ChatStatsResponse {
    #[serde(flatten)]
    stats: ChatStats,
    success_rate: Option<f64>,
    top_engine: Option<String>,
}

#[derive(Serialize)]
struct GlobalStatsResponse {
    #[serde(flatten)]
    stats: GlobalStats,
    cache_size: usize,
}

#[derive(Serialize)]
struct ResetResponse {
    chat_id: ChatId,
    removed: bool,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    engines: Vec<String>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn api_error(status: StatusCode, message: impl Into<String>, code: &str, kind: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: ErrorDetail {
                message: message.into(),
                code: Some(code.to_string()),
                r#type: Some(kind.to_string()),
            },
        }),
    )
}

fn from_translation_error(err: TranslationError) -> ApiError {
    match &err {
        TranslationError::ValidationError { .. } => api_error(
            StatusCode::BAD_REQUEST,
            err.to_string(),
            "invalid_request",
            "invalid_request_error",
        ),
        TranslationError::ConfigError { .. } => api_error(
            StatusCode::BAD_REQUEST,
            err.to_string(),
            "engine_not_configured",
            "invalid_request_error",
        ),
        TranslationError::RateLimited { .. } => api_error(
            StatusCode::TOO_MANY_REQUESTS,
            err.to_string(),
            "rate_limited",
            "rate_limit_error",
        ),
        TranslationError::AllEnginesFailed { .. }
        | TranslationError::TimeoutError { .. }
        | TranslationError::ProviderError { .. } => api_error(
            StatusCode::BAD_GATEWAY,
            err.to_string(),
            "translation_failed",
            "api_error",
        ),
        _ => {
            warn!("Internal error: {}", err);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error",
                "internal_error",
                "api_error",
            )
        }
    }
}

fn parse_engine(raw: &str) -> Result<Engine, ApiError> {
    raw.parse::<Engine>().map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            e,
            "unknown_engine",
            "invalid_request_error",
        )
    })
}

/// Health check handler
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_engines(State(state): State<Arc<AppState>>) -> Json<EnginesResponse> {
    Json(EnginesResponse {
        object: "list".to_string(),
        data: state.service.engines(),
    })
}

async fn ping_engine(
    State(state): State<Arc<AppState>>,
    Path(engine): Path<String>,
) -> ApiResult<PingResponse> {
    let engine = parse_engine(&engine)?;
    let elapsed = state
        .service
        .probe(engine.as_str())
        .await
        .map_err(from_translation_error)?;

    Ok(Json(PingResponse {
        engine: engine.to_string(),
        latency_ms: elapsed.as_millis() as u64,
    }))
}

/// Translation handler
async fn translate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TranslateBody>,
) -> ApiResult<ServedTranslation> {
    let mut request = state.service.request_for_chat(payload.chat_id, &payload.text);

    if let Some(engine) = payload.engine.as_deref().filter(|e| !e.trim().is_empty()) {
        request.preferred_engine = parse_engine(engine)?.to_string();
        request.model = None;
    }
    if payload.model.is_some() {
        request = request.with_model(payload.model);
    }
    if let Some(target) = payload.target_lang.filter(|t| !t.trim().is_empty()) {
        request.target_lang = target;
    }
    if let Some(source) = payload.source_lang.filter(|s| !s.trim().is_empty()) {
        request = request.with_source_lang(source);
    }

    match state
        .service
        .translate_text(payload.user_id, payload.chat_id, request)
        .await
    {
        Ok(served) => Ok(Json(served)),
        Err(e) => {
            warn!("Translation failed for chat {}: {}", payload.chat_id, e);
            Err(from_translation_error(e))
        }
    }
}

async fn get_chat_config(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<ChatId>,
) -> Json<ChatConfig> {
    Json(state.service.store().get_chat_config(chat_id))
}

async fn put_chat_config(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<ChatId>,
    Json(patch): Json<ChatConfig>,
) -> ApiResult<ChatConfig> {
    let mut patch = patch;
    if let Some(provider) = patch.provider.as_deref() {
        patch.provider = Some(parse_engine(provider)?.to_string());
    }
    if patch.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "empty config update",
            "invalid_request",
            "invalid_request_error",
        ));
    }

    info!("Updating config for chat {}", chat_id);
    Ok(Json(state.service.store().set_chat_config(chat_id, patch)))
}

async fn reset_chat_config(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<ChatId>,
) -> Json<ResetResponse> {
    let removed = state.service.store().reset_chat_config(chat_id);
    Json(ResetResponse { chat_id, removed })
}

async fn get_chat_stats(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<ChatId>,
) -> Json<ChatStatsResponse> {
    let stats = state.service.store().get_stats(chat_id);
    Json(ChatStatsResponse {
        success_rate: stats.success_rate(),
        top_engine: stats.top_engine().map(str::to_string),
        stats,
    })
}

async fn clear_chat_stats(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<ChatId>,
) -> Json<ResetResponse> {
    let removed = state.service.store().clear_chat_stats(chat_id);
    Json(ResetResponse { chat_id, removed })
}

async fn global_stats(State(state): State<Arc<AppState>>) -> Json<GlobalStatsResponse> {
    Json(GlobalStatsResponse {
        stats: state.service.store().get_global_stats(),
        cache_size: state.service.cache_len(),
    })
}

async fn reload(State(state): State<Arc<AppState>>) -> ApiResult<ReloadResponse> {
    let config = TranslatorConfig::reload_from(state.config_path.as_deref()).map_err(|e| {
        warn!("Config reload failed: {}", e);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("config reload failed: {}", e),
            "config_error",
            "api_error",
        )
    })?;

    state.service.reload_credentials(config.api_keys);
    Ok(Json(ReloadResponse {
        engines: state.service.orchestrator().registry().available_engines(),
    }))
}

/// Build the API router
pub fn router(service: Arc<TranslationService>, config_path: Option<PathBuf>) -> Router {
    let state = Arc::new(AppState::new(service, config_path));

    Router::new()
        .route("/", get(health_check))
        .route("/v1/engines", get(list_engines))
        .route("/v1/engines/:engine/ping", get(ping_engine))
        .route("/v1/translate", post(translate))
        .route(
            "/v1/chats/:chat_id/config",
            get(get_chat_config)
                .put(put_chat_config)
                .delete(reset_chat_config),
        )
        .route(
            "/v1/chats/:chat_id/stats",
            get(get_chat_stats).delete(clear_chat_stats),
        )
        .route("/v1/stats", get(global_stats))
        .route("/v1/admin/reload", post(reload))
        .with_state(state)
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

/// Run the HTTP server until a shutdown signal, then flush the store
pub async fn run_server(
    service: Arc<TranslationService>,
    config_path: Option<PathBuf>,
    host: String,
    port: u16,
) -> anyhow::Result<()> {
    let app = router(service.clone(), config_path);

    // Bind address
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown();
    info!("Server stopped");

    Ok(())
}
