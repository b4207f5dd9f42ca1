//! Authenticated HTTP gateway to the dashboard backend.
//!
//! Every backend call goes through [`GatewayClient`]. It attaches the
//! session's bearer token, unwraps the backend's `{success, message, ...}`
//! envelope, and turns a 401 into a forced logout: the session is cleared,
//! a [`SessionEvent::ForcedLogout`] is published, and the failure is still
//! returned to the caller.

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::broadcast;
use widgetdash_core::models::{
    AttachWidget, AuthResponse, LoginRequest, PositionsRequest, RegisterRequest,
    UpdateUserWidget, User, UserWidget, WidgetDefinition, WidgetPosition,
};
use widgetdash_core::routing::LOGIN_PATH;
use widgetdash_core::types::DbId;

use crate::config::ClientConfig;
use crate::events::{SessionEvent, EVENT_CHANNEL_CAPACITY};
use crate::session::{SessionError, SessionStore};

/// Errors from the gateway layer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered 401. The session has already been cleared.
    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    /// The backend returned a non-2xx status other than 401.
    #[error("Backend error ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Api {
        status: u16,
        /// The envelope's `message`, when the body carried one.
        message: Option<String>,
    },

    /// A 2xx envelope carried `success: false`.
    #[error("Request rejected: {}", .0.as_deref().unwrap_or("no message"))]
    Rejected(Option<String>),

    /// The response body did not match the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Storing or clearing the session failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl GatewayError {
    /// Message to show the user: the backend's own message when it sent
    /// one, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            GatewayError::Unauthorized(msg) => msg.clone(),
            GatewayError::Api {
                message: Some(msg), ..
            }
            | GatewayError::Rejected(Some(msg)) => msg.clone(),
            _ => fallback.to_string(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GatewayError::Unauthorized(_))
    }
}

/// Message used when a 401 body carries none.
const SESSION_EXPIRED: &str = "Session expired, please log in again";

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WidgetsBody<T> {
    #[serde(default = "Vec::new")]
    widgets: Vec<T>,
}

#[derive(Deserialize)]
struct DataBody {
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProfileBody {
    Wrapped { user: User },
    Bare(User),
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
}

// ---------------------------------------------------------------------------
// GatewayClient
// ---------------------------------------------------------------------------

/// HTTP client for the dashboard backend.
pub struct GatewayClient {
    client: reqwest::Client,
    api_url: String,
    session: SessionStore,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl GatewayClient {
    /// Create a gateway from configuration, sharing `session`.
    pub fn new(config: &ClientConfig, session: SessionStore) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(client, config.api_url.clone(), session))
    }

    /// Create a gateway reusing an existing [`reqwest::Client`].
    ///
    /// * `api_url` - Base URL, e.g. `http://localhost:8000/api`.
    pub fn with_client(client: reqwest::Client, api_url: String, session: SessionStore) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            session,
            event_tx,
        }
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// The session this gateway authenticates with.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    // ---- auth ----

    /// Exchange credentials for a token and store the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, GatewayError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let auth: AuthResponse = self.execute(self.client.post(self.url("/login")).json(&body)).await?;
        self.start_session(auth)
    }

    /// Create an account and store the returned session.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        password_confirmation: &str,
    ) -> Result<User, GatewayError> {
        let body = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            password_confirmation: password_confirmation.to_string(),
        };
        let auth: AuthResponse = self
            .execute(self.client.post(self.url("/register")).json(&body))
            .await?;
        self.start_session(auth)
    }

    /// Invalidate the session server-side, then clear it locally.
    ///
    /// The local session is cleared even when the backend call fails; the
    /// backend error is still returned.
    pub async fn logout(&self) -> Result<(), GatewayError> {
        let result: Result<MessageBody, _> = self.execute(self.client.post(self.url("/logout"))).await;

        // A 401 has already cleared the session and announced the forced logout.
        if matches!(result, Err(GatewayError::Unauthorized(_))) {
            return Ok(());
        }

        self.session.clear_credential()?;
        let _ = self.event_tx.send(SessionEvent::LoggedOut);
        tracing::info!("Logged out");

        result.map(|_| ())
    }

    /// Fetch the current user's profile and refresh the stored copy.
    pub async fn profile(&self) -> Result<User, GatewayError> {
        let body: ProfileBody = self.execute(self.client.get(self.url("/profile"))).await?;
        let user = match body {
            ProfileBody::Wrapped { user } | ProfileBody::Bare(user) => user,
        };
        self.session.update_user(user.clone())?;
        Ok(user)
    }

    // ---- widgets ----

    /// List the catalog of widget definitions.
    pub async fn list_catalog(&self) -> Result<Vec<WidgetDefinition>, GatewayError> {
        let body: WidgetsBody<WidgetDefinition> =
            self.execute(self.client.get(self.url("/widgets"))).await?;
        Ok(body.widgets)
    }

    /// List the current user's configured widgets.
    pub async fn list_user_widgets(&self) -> Result<Vec<UserWidget>, GatewayError> {
        let body: WidgetsBody<UserWidget> =
            self.execute(self.client.get(self.url("/user/widgets"))).await?;
        Ok(body.widgets)
    }

    /// Attach a widget definition to the current user.
    pub async fn attach_widget(
        &self,
        widget_id: DbId,
        input: &AttachWidget,
    ) -> Result<(), GatewayError> {
        let _: MessageBody = self
            .execute(
                self.client
                    .post(self.url(&format!("/user/widgets/{widget_id}")))
                    .json(input),
            )
            .await?;
        tracing::info!(widget_id, "Widget attached");
        Ok(())
    }

    /// Update settings, position or visibility of a user widget.
    pub async fn update_user_widget(
        &self,
        widget_id: DbId,
        input: &UpdateUserWidget,
    ) -> Result<(), GatewayError> {
        let _: MessageBody = self
            .execute(
                self.client
                    .put(self.url(&format!("/user/widgets/{widget_id}")))
                    .json(input),
            )
            .await?;
        tracing::debug!(widget_id, "Widget updated");
        Ok(())
    }

    /// Detach a widget from the current user.
    pub async fn remove_user_widget(&self, widget_id: DbId) -> Result<(), GatewayError> {
        let _: MessageBody = self
            .execute(
                self.client
                    .delete(self.url(&format!("/user/widgets/{widget_id}"))),
            )
            .await?;
        tracing::info!(widget_id, "Widget removed");
        Ok(())
    }

    /// Bulk-assign display positions.
    pub async fn update_positions(&self, positions: &[WidgetPosition]) -> Result<(), GatewayError> {
        let body = PositionsRequest {
            positions: positions.to_vec(),
        };
        let _: MessageBody = self
            .execute(
                self.client
                    .post(self.url("/user/widgets/positions"))
                    .json(&body),
            )
            .await?;
        Ok(())
    }

    /// Fetch live upstream data for a configured widget.
    pub async fn widget_data(&self, widget_id: DbId) -> Result<serde_json::Value, GatewayError> {
        let body: DataBody = self
            .execute(self.client.get(self.url(&format!("/widget-data/{widget_id}"))))
            .await?;
        Ok(body.data)
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Store the credential from a successful auth response.
    fn start_session(&self, auth: AuthResponse) -> Result<User, GatewayError> {
        let user = auth.user;
        self.session.set_credential(auth.token, user.clone())?;
        let _ = self.event_tx.send(SessionEvent::LoggedIn { user_id: user.id });
        tracing::info!(user_id = user.id, "Session started");
        Ok(user)
    }

    /// Send a request with the session's credentials and decode the
    /// envelope into `T`.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, GatewayError> {
        let mut request = request.header(ACCEPT, "application/json");
        if let Some(token) = self.session.token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if status == StatusCode::UNAUTHORIZED {
            let message = envelope_message(&bytes).unwrap_or_else(|| SESSION_EXPIRED.to_string());
            self.force_logout();
            return Err(GatewayError::Unauthorized(message));
        }

        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: envelope_message(&bytes),
            });
        }

        let body: serde_json::Value = if bytes.is_empty() {
            serde_json::Value::Object(Default::default())
        } else {
            serde_json::from_slice(&bytes)?
        };

        if body.get("success") == Some(&serde_json::Value::Bool(false)) {
            let message = body
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string);
            return Err(GatewayError::Rejected(message));
        }

        Ok(serde_json::from_value(body)?)
    }

    /// Clear the session and announce the redirect to the login surface.
    fn force_logout(&self) {
        if let Err(e) = self.session.clear_credential() {
            tracing::error!(error = %e, "Failed to clear persisted session");
        }
        tracing::warn!("Backend rejected credentials, forcing logout");
        let _ = self.event_tx.send(SessionEvent::ForcedLogout {
            redirect_to: LOGIN_PATH,
        });
    }
}

/// Pull the `message` field out of a JSON error body, if there is one.
fn envelope_message(bytes: &[u8]) -> Option<String> {
    serde_json::from_slice::<MessageBody>(bytes)
        .ok()
        .and_then(|body| body.message)
        .filter(|m| !m.is_empty())
}
