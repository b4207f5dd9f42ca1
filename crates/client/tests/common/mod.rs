//! Scripted fake dashboard backend served over real HTTP.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde_json::{json, Value};
use widgetdash_client::{GatewayClient, SessionStore};
use widgetdash_core::models::User;

/// One request as seen by the fake backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone, Default)]
struct FakeState {
    routes: Arc<Mutex<HashMap<(Method, String), (StatusCode, Value)>>>,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

pub struct FakeBackend {
    pub base_url: String,
    state: FakeState,
}

impl FakeBackend {
    /// Start the fake backend on an ephemeral local port.
    pub async fn start() -> Self {
        let state = FakeState::default();
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}/api"),
            state,
        }
    }

    /// Answer `method path` with `status` and a JSON `body`.
    pub fn respond(&self, method: Method, path: &str, status: StatusCode, body: Value) {
        self.state
            .routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), (status, body));
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("no request recorded")
    }

    /// A gateway pointed at this backend with an in-memory session.
    pub fn gateway(&self) -> GatewayClient {
        GatewayClient::with_client(
            reqwest::Client::new(),
            self.base_url.clone(),
            SessionStore::in_memory(),
        )
    }

    /// A gateway that already holds `token`.
    pub fn signed_in_gateway(&self, token: &str) -> GatewayClient {
        let gateway = self.gateway();
        gateway
            .session()
            .set_credential(token.to_string(), test_user())
            .unwrap();
        gateway
    }
}

async fn handle(
    State(state): State<FakeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let path = uri
        .path()
        .strip_prefix("/api")
        .unwrap_or(uri.path())
        .to_string();

    state.requests.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });

    let scripted = state.routes.lock().unwrap().get(&(method, path)).cloned();
    let (status, body) = scripted.unwrap_or((
        StatusCode::NOT_FOUND,
        json!({"success": false, "message": "Not found"}),
    ));
    (status, Json(body))
}

pub fn test_user() -> User {
    User {
        id: 1,
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        widget_ids: vec![],
    }
}

pub fn user_json() -> Value {
    json!({"id": 1, "name": "Ada", "email": "ada@example.com", "widget_ids": [10]})
}
