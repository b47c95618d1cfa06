//! A stand-in for the remote identity service.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
};
use http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use serde_json::json;
use tokio::net::TcpListener;

/// Token the mock accepts as user 7, `alice`.
pub const VALID_TOKEN: &str = "abc123";

/// Token the mock refuses with 401.
pub const EXPIRED_TOKEN: &str = "expired";

/// Token for which the mock never answers in time.
pub const SLOW_TOKEN: &str = "slow";

#[derive(Clone)]
struct MockState {
    calls: Arc<AtomicUsize>,
}

/// Serves `GET /verify-token` on a random local port and counts every call.
pub struct MockIdentityService {
    address: SocketAddr,
    calls: Arc<AtomicUsize>,
}

impl MockIdentityService {
    /// Starts the mock in the background.
    pub async fn start() -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        let state = MockState { calls: calls.clone() };

        let app = Router::new().route("/verify-token", get(verify_token)).with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { address, calls }
    }

    /// Base URL of the mock.
    pub fn url(&self) -> String {
        format!("http://{}", self.address)
    }

    /// How many verification calls the mock has received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn verify_token(State(state): State<MockState>, headers: HeaderMap) -> Response {
    state.calls.fetch_add(1, Ordering::SeqCst);

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .unwrap_or_default();

    match token {
        VALID_TOKEN => Json(json!({
            "valid": true,
            "user_id": 7,
            "username": "alice",
            "email": "a@x.com"
        }))
        .into_response(),
        SLOW_TOKEN => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::OK.into_response()
        }
        EXPIRED_TOKEN => (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Token has expired" }))).into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Invalid authentication credentials" })),
        )
            .into_response(),
    }
}
