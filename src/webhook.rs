//! HTTP webhook surface
//!
//! One parameterized chat handler serves every subject-area deployment.
//! Per-request pipeline: validate → authenticate → history → compose →
//! generate → persist both turns → respond. Downstream calls are awaited
//! sequentially; any failure aborts the request and surfaces as a single
//! error response, never a retry.

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::compose::compose;
use crate::config::{AppConfig, HistoryMode, VariantProfile};
use crate::error::ChatError;
use crate::gemini::GeminiClient;
use crate::memory::{EvictionPolicy, HistoryWindow, SessionRegistry};
use crate::models::ChatTurnMessage;
use crate::retrieval::VectorIndexClient;
use crate::store::ConversationStore;
use crate::tools::{FeedbackTool, InsightsTool, RetrievalTool, ToolRegistry};
use crate::Result;

/// =============================
/// Request / Response Models
/// =============================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    /// Stateful deployments historically posted `userId`; both names are
    /// accepted and mean the same session identifier.
    #[serde(default, alias = "userId")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub session_id: String,
    /// Unix milliseconds.
    pub timestamp: i64,
}

/// =============================
/// Service State
/// =============================

/// Dependencies shared by every variant.
pub struct SharedState {
    pub gemini: Arc<GeminiClient>,
    pub index: Arc<VectorIndexClient>,
    pub store: Arc<ConversationStore>,
    pub auth_secret: String,
}

/// Per-variant handler state: the deployment profile, its tool set, and
/// (for stateful variants) the session registry that owns in-process
/// history.
#[derive(Clone)]
pub struct VariantState {
    pub profile: VariantProfile,
    pub shared: Arc<SharedState>,
    pub tools: Arc<ToolRegistry>,
    pub sessions: Arc<SessionRegistry>,
}

impl VariantState {
    fn new(profile: VariantProfile, shared: Arc<SharedState>) -> Self {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(RetrievalTool::new(
            shared.gemini.clone(),
            shared.index.clone(),
            profile.namespace,
        )));
        tools.register(Arc::new(InsightsTool::new(shared.store.clone())));
        tools.register(Arc::new(FeedbackTool::new(shared.store.clone())));

        let window_cap = match profile.history {
            HistoryMode::Stateful { cap } => cap,
            HistoryMode::Stateless { window } => window,
        };
        let sessions = Arc::new(SessionRegistry::new(window_cap, EvictionPolicy::default()));

        Self {
            profile,
            shared,
            tools: Arc::new(tools),
            sessions,
        }
    }
}

/// =============================
/// Handlers
/// =============================

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn chat_handler(
    State(state): State<VariantState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<Value>) {
    let request_id = Uuid::new_v4();
    info!(%request_id, variant = state.profile.endpoint, "Received chat request");

    match handle_chat(&state, req, request_id).await {
        Ok(response) => {
            let body = serde_json::to_value(&response).unwrap_or_else(|_| json!({}));
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            error!(%request_id, "Chat request failed: {}", e);
            (e.status_code(), Json(error_body(&e)))
        }
    }
}

fn error_body(error: &ChatError) -> Value {
    match error.details() {
        Some(details) => json!({ "error": error.to_string(), "details": details }),
        None => json!({ "error": error.to_string() }),
    }
}

/// Validate the request shape: a non-empty message and session identifier.
fn validate(req: &ChatRequest) -> Result<(String, String)> {
    let message = req
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty());
    let session_id = req
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match (message, session_id) {
        (Some(m), Some(s)) => Ok((m.to_string(), s.to_string())),
        _ => Err(ChatError::Validation(String::new())),
    }
}

/// Exact-string shared-secret check. Runs strictly after validation; the
/// secret itself is never echoed or logged.
fn authenticate(req: &ChatRequest, secret: &str) -> Result<()> {
    match req.auth_token.as_deref() {
        Some(token) if token == secret => Ok(()),
        _ => Err(ChatError::Auth(String::new())),
    }
}

async fn handle_chat(
    state: &VariantState,
    req: ChatRequest,
    request_id: Uuid,
) -> Result<ChatResponse> {
    let profile = &state.profile;
    let shared = &state.shared;

    let (message, session_id) = validate(&req)?;
    authenticate(&req, &shared.auth_secret)?;

    // Short-term history: either re-fetched from storage or read from the
    // in-process registry, depending on the deployment profile.
    let history: Vec<ChatTurnMessage> = match profile.history {
        HistoryMode::Stateless { window } => {
            let rows = shared
                .store
                .recent_messages(profile.table_name, &session_id, window)
                .await?;
            HistoryWindow::from_messages(window, rows).to_vec()
        }
        HistoryMode::Stateful { .. } => {
            state.sessions.evict_idle().await;
            state.sessions.snapshot(&session_id).await
        }
    };
    info!(%request_id, history_len = history.len(), "History loaded");

    let prompt = compose(profile.system_prompt, &history, &message);

    let reply = shared.gemini.generate(&prompt, &state.tools).await?;
    info!(%request_id, reply_len = reply.len(), "Reply generated");

    if let HistoryMode::Stateful { .. } = profile.history {
        state
            .sessions
            .append(&session_id, ChatTurnMessage::user(message.as_str()))
            .await;
        state
            .sessions
            .append(&session_id, ChatTurnMessage::assistant(reply.as_str()))
            .await;
    }

    // Persist both turns. A failure here loses the reply for the caller
    // even though generation succeeded; that gap is deliberate (no
    // compensating transaction).
    shared
        .store
        .append_turn(profile.table_name, &session_id, &message, &reply)
        .await?;
    info!(%request_id, "Turn persisted");

    Ok(ChatResponse {
        success: true,
        response: reply,
        session_id,
        timestamp: chrono::Utc::now().timestamp_millis(),
    })
}

/// =============================
/// Router
/// =============================

pub fn create_router(shared: Arc<SharedState>, variants: Vec<VariantProfile>) -> Router {
    let mut router = Router::new().route("/health", get(health));

    for profile in variants {
        let path = format!("/{}", profile.endpoint);
        let state = VariantState::new(profile, shared.clone());
        router = router.merge(Router::new().route(&path, post(chat_handler)).with_state(state));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Build shared state from loaded configuration.
pub fn build_shared_state(
    config: &AppConfig,
    variants: &[VariantProfile],
) -> Result<Arc<SharedState>> {
    let tables = variants.iter().map(|v| v.table_name.to_string()).collect();

    Ok(Arc::new(SharedState {
        gemini: Arc::new(GeminiClient::new(config.gemini_api_key.clone())?),
        index: Arc::new(VectorIndexClient::new(
            config.pinecone_api_key.clone(),
            config.pinecone_index_host.clone(),
        )?),
        store: Arc::new(ConversationStore::connect(&config.database_url, tables)?),
        auth_secret: config.auth_secret.clone(),
    }))
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(router: Router, port: u16) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("Webhook server listening on http://0.0.0.0:{}", port);
    axum::serve(listener, router)
        .await
        .map_err(ChatError::Io)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router() -> Router {
        let config = AppConfig {
            gemini_api_key: "test-gemini-key".into(),
            pinecone_api_key: "test-index-key".into(),
            pinecone_index_host: "test-index.svc.pinecone.io".into(),
            // Lazy pool: no server is dialed unless a request survives
            // validation and auth.
            database_url: "postgres://user:pw@localhost:1/none".into(),
            auth_secret: "topsecret".into(),
            port: 0,
        };
        let variants = crate::config::builtin_variants();
        let shared = build_shared_state(&config, &variants).unwrap();
        create_router(shared, variants)
    }

    async fn post_chat(router: Router, path: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let (status, body) = post_chat(
            test_router(),
            "/science/chat",
            json!({ "message": "", "sessionId": "s1", "authToken": "topsecret" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("Missing message or sessionId"));
    }

    #[tokio::test]
    async fn test_missing_session_id_is_rejected() {
        let (status, body) = post_chat(
            test_router(),
            "/science/chat",
            json!({ "message": "hi", "authToken": "topsecret" }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing message or sessionId");
    }

    #[tokio::test]
    async fn test_absent_fields_do_not_crash() {
        let (status, _) = post_chat(test_router(), "/science/chat", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_wrong_auth_token_is_unauthorized() {
        let (status, body) = post_chat(
            test_router(),
            "/science/chat",
            json!({ "message": "hi", "sessionId": "s1", "authToken": "wrong" }),
        )
        .await;

        // Rejected before any store or model call: the lazy pool in
        // test_router points at a closed port, so reaching the store would
        // have produced a 500 instead.
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid authentication token");
    }

    #[tokio::test]
    async fn test_missing_auth_token_is_unauthorized() {
        let (status, _) = post_chat(
            test_router(),
            "/math/chat",
            json!({ "message": "hi", "userId": "u1" }),
        )
        .await;

        // `userId` aliases the session id, so validation passes and auth is
        // the rejecting stage.
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_endpoint_is_not_found() {
        let (status, _) = post_chat(
            test_router(),
            "/chemistry/chat",
            json!({ "message": "hi", "sessionId": "s1", "authToken": "topsecret" }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validate_trims_whitespace() {
        let req = ChatRequest {
            message: Some("  hi  ".into()),
            session_id: Some(" s1 ".into()),
            auth_token: None,
        };
        let (message, session_id) = validate(&req).unwrap();
        assert_eq!(message, "hi");
        assert_eq!(session_id, "s1");

        let blank = ChatRequest {
            message: Some("   ".into()),
            session_id: Some("s1".into()),
            auth_token: None,
        };
        assert!(validate(&blank).is_err());
    }

    #[test]
    fn test_authenticate_exact_match_only() {
        let req = |token: Option<&str>| ChatRequest {
            message: Some("hi".into()),
            session_id: Some("s1".into()),
            auth_token: token.map(String::from),
        };

        assert!(authenticate(&req(Some("secret")), "secret").is_ok());
        assert!(authenticate(&req(Some("Secret")), "secret").is_err());
        assert!(authenticate(&req(Some("secret ")), "secret").is_err());
        assert!(authenticate(&req(None), "secret").is_err());
    }

    #[test]
    fn test_response_shape() {
        let response = ChatResponse {
            success: true,
            response: "hello".into(),
            session_id: "s1".into(),
            timestamp: 1_700_000_000_000,
        };

        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["sessionId"], "s1");
        assert!(body["timestamp"].is_number());
    }
}
