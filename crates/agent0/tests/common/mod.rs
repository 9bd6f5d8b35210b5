//! Shared helpers for integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use agent0::auth::{AuthError, AuthResult, TokenProvider, UserProfile};

pub const TEST_USER: &str = "auth0|test-user";
pub const TEST_TOKEN: &str = "test-access-token";

/// Identity stub with a permanent session.
pub struct TestIdentity;

#[async_trait]
impl TokenProvider for TestIdentity {
    fn is_authenticated(&self) -> bool {
        true
    }

    fn user(&self) -> Option<UserProfile> {
        Some(UserProfile {
            sub: TEST_USER.to_string(),
            name: Some("Test User".to_string()),
            email: Some("test@example.com".to_string()),
        })
    }

    async fn access_token(&self) -> AuthResult<String> {
        Ok(TEST_TOKEN.to_string())
    }

    async fn request_login(&self) -> AuthResult<UserProfile> {
        Err(AuthError::LoginRequired)
    }
}

/// Captured state of the mock agent endpoint.
#[derive(Default)]
pub struct AgentEndpoint {
    /// Request bodies received, in order.
    pub requests: Mutex<Vec<Value>>,
    /// When set, every request is answered with HTTP 500.
    pub fail: AtomicBool,
}

/// Spawn a mock agent endpoint on an ephemeral port. Successful requests
/// are answered with `{"response": reply}`.
pub async fn spawn_agent_endpoint(reply: &'static str) -> (String, Arc<AgentEndpoint>) {
    let state = Arc::new(AgentEndpoint::default());

    let app = Router::new()
        .route("/agent", post(handle_agent))
        .with_state((state.clone(), reply));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), state)
}

async fn handle_agent(
    State((state, reply)): State<(Arc<AgentEndpoint>, &'static str)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    state.requests.lock().unwrap().push(body);
    if state.fail.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(Json(json!({ "response": reply })))
}
