//! HTTP/JSON service surface consumed by the external protocol adapter.
//!
//! Endpoints:
//! - POST /create-session — register a session and start its remote side
//! - GET  /list-sessions  — garbage-collect, then list all sessions
//! - POST /send-message   — liveness-gated message injection
//! - GET  /read-output    — last N lines of the session terminal
//! - GET  /health         — liveness probe
//!
//! The adapter must not assume anything about the remote host beyond
//! what these JSON payloads expose.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use dev_sessions_core::{CliChoice, RemoteExecutor, RunMode, SessionStore};
use dev_sessions_gateway::{GatewayError, GatewayService, SessionSummary};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Build the router over a shared gateway service.
pub fn build_router<S, R>(gateway: Arc<GatewayService<S, R>>) -> Router
where
    S: SessionStore + 'static,
    R: RemoteExecutor + 'static,
{
    Router::new()
        .route("/create-session", post(create_session::<S, R>))
        .route("/list-sessions", get(list_sessions::<S, R>))
        .route("/send-message", post(send_message::<S, R>))
        .route("/read-output", get(read_output::<S, R>))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(gateway)
}

/// JSON error envelope with the mapped status code.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let status = match &err {
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            // Id exhaustion, remote failures (including the liveness
            // gate, which keeps its own message) and store errors.
            GatewayError::IdExhausted(_)
            | GatewayError::Store(_)
            | GatewayError::Remote(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
    host_path: String,
    description: Option<String>,
    creator: Option<String>,
    #[serde(default)]
    cli: CliChoice,
    #[serde(default)]
    mode: RunMode,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    session_id: String,
    tmux_session_name: String,
    workspace_path: String,
    message: String,
}

async fn create_session<S, R>(
    State(gateway): State<Arc<GatewayService<S, R>>>,
    payload: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<Json<CreateSessionResponse>, ApiError>
where
    S: SessionStore,
    R: RemoteExecutor,
{
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    if req.host_path.is_empty() {
        return Err(ApiError::bad_request("hostPath is required"));
    }

    let description = req
        .description
        .unwrap_or_else(|| "Dev session handoff".to_string());
    let creator = req.creator.unwrap_or_else(|| "unknown".to_string());

    let created = gateway
        .create_session(&req.host_path, &description, &creator, req.cli, req.mode)
        .await?;

    Ok(Json(CreateSessionResponse {
        session_id: created.session.id,
        tmux_session_name: created.session.remote_name,
        workspace_path: created.session.workspace_path,
        message: created.attach_hint,
    }))
}

#[derive(Debug, Serialize)]
struct ListSessionsResponse {
    sessions: Vec<SessionSummary>,
}

async fn list_sessions<S, R>(
    State(gateway): State<Arc<GatewayService<S, R>>>,
) -> Result<Json<ListSessionsResponse>, ApiError>
where
    S: SessionStore,
    R: RemoteExecutor,
{
    let sessions = gateway.list_sessions().await?;
    Ok(Json(ListSessionsResponse { sessions }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    session_id: String,
    message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageResponse {
    success: bool,
    session_id: String,
    message: String,
}

async fn send_message<S, R>(
    State(gateway): State<Arc<GatewayService<S, R>>>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<SendMessageResponse>, ApiError>
where
    S: SessionStore,
    R: RemoteExecutor,
{
    let Json(req) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    if req.session_id.is_empty() {
        return Err(ApiError::bad_request("sessionId is required"));
    }
    if req.message.is_empty() {
        return Err(ApiError::bad_request("message is required"));
    }

    gateway.send_message(&req.session_id, &req.message).await?;

    Ok(Json(SendMessageResponse {
        success: true,
        session_id: req.session_id,
        message: "Message sent successfully".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadOutputQuery {
    session_id: String,
    lines: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadOutputResponse {
    session_id: String,
    output: String,
    lines: u32,
}

async fn read_output<S, R>(
    State(gateway): State<Arc<GatewayService<S, R>>>,
    query: Result<Query<ReadOutputQuery>, QueryRejection>,
) -> Result<Json<ReadOutputResponse>, ApiError>
where
    S: SessionStore,
    R: RemoteExecutor,
{
    let Query(req) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    if req.session_id.is_empty() {
        return Err(ApiError::bad_request("sessionId is required"));
    }

    let (output, lines) = gateway.read_output(&req.session_id, req.lines).await?;

    Ok(Json(ReadOutputResponse {
        session_id: req.session_id,
        output,
        lines,
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use dev_sessions_core::{IdGenerator, RemoteError};
    use dev_sessions_store::MemoryStore;
    use tower::ServiceExt;

    use super::*;

    #[derive(Default, Clone)]
    struct FakeRemote {
        existing: Arc<Mutex<HashSet<String>>>,
        running: Arc<Mutex<HashSet<String>>>,
    }

    #[async_trait]
    impl RemoteExecutor for FakeRemote {
        async fn create_remote_session(
            &self,
            remote_name: &str,
            _workspace_path: &str,
            _cli: CliChoice,
            _mode: RunMode,
        ) -> Result<(), RemoteError> {
            self.existing.lock().expect("lock").insert(remote_name.to_string());
            self.running.lock().expect("lock").insert(remote_name.to_string());
            Ok(())
        }

        async fn is_program_running(&self, remote_name: &str) -> bool {
            self.running.lock().expect("lock").contains(remote_name)
        }

        async fn send_message(&self, remote_name: &str, _text: &str) -> Result<(), RemoteError> {
            if self.is_program_running(remote_name).await {
                Ok(())
            } else {
                Err(RemoteError::NoLiveProgram)
            }
        }

        async fn capture_output(
            &self,
            _remote_name: &str,
            _lines: i64,
        ) -> Result<String, RemoteError> {
            Ok("$ cargo test\nok\n".to_string())
        }

        async fn session_exists(&self, remote_name: &str) -> bool {
            self.existing.lock().expect("lock").contains(remote_name)
        }

        async fn list_remote_sessions(&self) -> Vec<String> {
            self.existing.lock().expect("lock").iter().cloned().collect()
        }

        async fn kill_session(&self, remote_name: &str) -> Result<(), RemoteError> {
            self.existing.lock().expect("lock").remove(remote_name);
            self.running.lock().expect("lock").remove(remote_name);
            Ok(())
        }
    }

    struct SeqIds(AtomicUsize);

    impl IdGenerator for SeqIds {
        fn generate(&self) -> String {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            format!("test-{n}")
        }
    }

    fn test_router(max_per_creator: usize) -> Router {
        let gateway = Arc::new(GatewayService::new(
            MemoryStore::new(),
            FakeRemote::default(),
            Box::new(SeqIds(AtomicUsize::new(0))),
            max_per_creator,
        ));
        build_router(gateway)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn health_reports_status_and_timestamp() {
        let response = test_router(10).oneshot(get_req("/health")).await.expect("oneshot");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn create_then_list_round_trips() {
        let app = test_router(10);

        let response = app
            .clone()
            .oneshot(post_json(
                "/create-session",
                json!({"hostPath": "/home/alice/proj", "creator": "alice"}),
            ))
            .await
            .expect("oneshot");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["sessionId"], "test-0");
        assert_eq!(body["tmuxSessionName"], "dev-test-0");
        assert_eq!(body["workspacePath"], "/home/alice/proj");
        assert!(body["message"].as_str().expect("message").contains("tmux attach -t dev-test-0"));

        let response = app.oneshot(get_req("/list-sessions")).await.expect("oneshot");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let sessions = body["sessions"].as_array().expect("sessions");
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0]["sessionId"], "test-0");
        assert_eq!(sessions[0]["status"], "active");
        assert_eq!(sessions[0]["creator"], "alice");
    }

    #[tokio::test]
    async fn hostile_host_path_is_a_bad_request() {
        let response = test_router(10)
            .oneshot(post_json(
                "/create-session",
                json!({"hostPath": "/tmp; rm -rf /"}),
            ))
            .await
            .expect("oneshot");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().expect("error").contains("invalid characters"));
    }

    #[tokio::test]
    async fn unknown_cli_option_is_a_bad_request() {
        let response = test_router(10)
            .oneshot(post_json(
                "/create-session",
                json!({"hostPath": "/work", "cli": "vim"}),
            ))
            .await
            .expect("oneshot");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn quota_maps_to_429() {
        let app = test_router(1);

        let response = app
            .clone()
            .oneshot(post_json("/create-session", json!({"hostPath": "/w", "creator": "alice"})))
            .await
            .expect("oneshot");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(post_json("/create-session", json!({"hostPath": "/w", "creator": "alice"})))
            .await
            .expect("oneshot");
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert!(body["error"].as_str().expect("error").contains("alice"));
    }

    #[tokio::test]
    async fn send_message_to_unknown_session_is_404() {
        let response = test_router(10)
            .oneshot(post_json(
                "/send-message",
                json!({"sessionId": "ghost-sup", "message": "hi"}),
            ))
            .await
            .expect("oneshot");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_message_is_a_bad_request() {
        let response = test_router(10)
            .oneshot(post_json(
                "/send-message",
                json!({"sessionId": "test-0", "message": ""}),
            ))
            .await
            .expect("oneshot");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn read_output_echoes_clamped_lines() {
        let app = test_router(10);
        app.clone()
            .oneshot(post_json("/create-session", json!({"hostPath": "/w"})))
            .await
            .expect("create");

        let response = app
            .clone()
            .oneshot(get_req("/read-output?sessionId=test-0&lines=5000"))
            .await
            .expect("oneshot");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["lines"], 1000);
        assert!(body["output"].as_str().expect("output").contains("cargo test"));

        // Omitted lines falls back to the default.
        let response = app
            .oneshot(get_req("/read-output?sessionId=test-0"))
            .await
            .expect("oneshot");
        let body = body_json(response).await;
        assert_eq!(body["lines"], 100);
    }

    #[tokio::test]
    async fn non_numeric_lines_is_a_bad_request() {
        let response = test_router(10)
            .oneshot(get_req("/read-output?sessionId=test-0&lines=teapot"))
            .await
            .expect("oneshot");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn message_delivery_succeeds_with_a_live_program() {
        let app = test_router(10);
        app.clone()
            .oneshot(post_json("/create-session", json!({"hostPath": "/w"})))
            .await
            .expect("create");

        let response = app
            .oneshot(post_json(
                "/send-message",
                json!({"sessionId": "test-0", "message": "hi"}),
            ))
            .await
            .expect("oneshot");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["sessionId"], "test-0");
    }

    #[tokio::test]
    async fn dead_program_surfaces_the_gate_message_as_500() {
        let remote = FakeRemote::default();
        let running = Arc::clone(&remote.running);
        let gateway = Arc::new(GatewayService::new(
            MemoryStore::new(),
            remote,
            Box::new(SeqIds(AtomicUsize::new(0))),
            10,
        ));
        let app = build_router(gateway);

        app.clone()
            .oneshot(post_json("/create-session", json!({"hostPath": "/w"})))
            .await
            .expect("create");

        // The tmux session survives, but the CLI inside it died.
        running.lock().expect("lock").clear();

        let response = app
            .oneshot(post_json(
                "/send-message",
                json!({"sessionId": "test-0", "message": "hi"}),
            ))
            .await
            .expect("oneshot");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].as_str().expect("error").contains("refusing to send"));
    }
}
