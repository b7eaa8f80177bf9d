//! HTTP client for the device REST API.
//!
//! Error mapping follows one rule set for every call:
//!
//! - the request never completes → [`ErrorKind::Network`]
//! - HTTP 401 → [`ErrorKind::Unauthorized`]
//! - any other non-2xx → [`ErrorKind::Application`] carrying the body's
//!   `message` field, or `HTTP error! status: <code>` when absent
//! - a 2xx body that does not decode → [`ErrorKind::Protocol`]

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::header::COOKIE;
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use cafeteira_core::config::{ApiDialect, DeviceConfig};
use cafeteira_core::error::{AppError, ErrorKind};
use cafeteira_core::types::{
    ApiResponse, AuthCheck, LogEntry, LogListResponse, LoginResponse, NewUser, User,
    UserListResponse, UserLookup,
};
use cafeteira_core::AppResult;

use crate::endpoints::Endpoints;

/// Name of the session cookie set by the device.
pub const SESSION_COOKIE: &str = "session_id";

/// Client for one device.
///
/// Cheap to clone; clones share the HTTP connection pool and the session id.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    /// Underlying HTTP client.
    http: reqwest::Client,
    /// Device base URL.
    base_url: Url,
    /// Firmware dialect.
    dialect: ApiDialect,
    /// Route table for the dialect.
    endpoints: Endpoints,
    /// Session id sent as a cookie.
    session_id: Arc<RwLock<Option<String>>>,
}

impl DeviceClient {
    /// Build a client from configuration.
    pub fn new(config: &DeviceConfig) -> AppResult<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            AppError::configuration(format!("Invalid device base URL '{}': {e}", config.base_url))
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;

        Ok(Self {
            http,
            base_url,
            dialect: config.dialect,
            endpoints: Endpoints::for_dialect(config.dialect),
            session_id: Arc::new(RwLock::new(config.session_id.clone())),
        })
    }

    /// Device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Firmware dialect in use.
    pub fn dialect(&self) -> ApiDialect {
        self.dialect
    }

    /// Route table in use.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Current session id.
    pub fn session_id(&self) -> Option<String> {
        self.session_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the session id.
    pub fn set_session_id(&self, session_id: Option<String>) {
        *self.session_id.write().unwrap_or_else(|e| e.into_inner()) = session_id;
    }

    /// `Cookie` header value for the current session.
    pub fn session_cookie(&self) -> Option<String> {
        self.session_id()
            .map(|id| format!("{SESSION_COOKIE}={id}"))
    }

    /// Realtime socket URL: same host, `ws`/`wss` scheme, given path.
    pub fn websocket_url(&self, path: &str) -> AppResult<String> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| AppError::configuration(format!("Invalid realtime path '{path}': {e}")))?;
        let scheme = if self.base_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        url.set_scheme(scheme)
            .map_err(|()| AppError::configuration(format!("Cannot derive {scheme} URL from {url}")))?;
        Ok(url.to_string())
    }

    // ── Session ──────────────────────────────────────────────────

    /// Log in with username and password.
    ///
    /// Invalid credentials and blocked IPs come back as application errors
    /// carrying the device's message, not as [`ErrorKind::Unauthorized`].
    pub async fn login(&self, username: &str, password: &str) -> AppResult<LoginResponse> {
        let url = self.url(self.endpoints.login)?;
        let response = self
            .http
            .post(url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        let body: LoginResponse = response.json().await.unwrap_or_default();

        if !status.is_success() || !body.success {
            let message = body
                .message
                .clone()
                .unwrap_or_else(|| "Credenciais inválidas".to_string());
            warn!(username, status = %status, "Login rejected");
            return Err(AppError::application(message));
        }

        if let Some(session_id) = &body.session_id {
            self.set_session_id(Some(session_id.clone()));
        }
        info!(username, role = ?body.role, "Logged in");
        Ok(body)
    }

    /// Check whether the current session is valid.
    pub async fn check_auth(&self) -> AppResult<AuthCheck> {
        self.get_json(self.endpoints.auth_check).await
    }

    /// End the session on the device and forget the local session id.
    pub async fn logout(&self) -> AppResult<()> {
        let response = self.send(self.request(Method::POST, self.endpoints.logout)?).await?;
        if !response.status().is_success() {
            return Err(AppError::application("Erro ao fazer logout"));
        }
        self.set_session_id(None);
        info!("Logged out");
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Raw status object.
    pub async fn status(&self) -> AppResult<Map<String, Value>> {
        self.get_json(self.endpoints.status).await
    }

    /// Registered users.
    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        let body: UserListResponse = self.get_json(self.endpoints.users).await?;
        Ok(body.users)
    }

    /// Look up one card.
    pub async fn lookup_user(&self, uid: &str) -> AppResult<UserLookup> {
        let builder = self
            .request(Method::GET, self.endpoints.user_lookup)?
            .query(&[("uid", uid)]);
        let response = self.send(builder).await?;
        decode(check_status(response).await?).await
    }

    /// Device logs, optionally limited.
    pub async fn logs(&self, limit: Option<u32>) -> AppResult<Vec<LogEntry>> {
        let mut builder = self.request(Method::GET, self.endpoints.logs)?;
        if let Some(limit) = limit {
            builder = builder.query(&[("limit", limit)]);
        }
        let response = self.send(builder).await?;
        let body: LogListResponse = decode(check_status(response).await?).await?;
        Ok(body.logs)
    }

    /// Backup payload as returned by the device.
    pub async fn backup(&self) -> AppResult<Value> {
        self.get_json(self.endpoints.backup).await
    }

    /// Usage statistics.
    pub async fn stats(&self) -> AppResult<Value> {
        self.get_json(self.endpoints.stats).await
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Register a card.
    pub async fn add_user(&self, user: &NewUser) -> AppResult<ApiResponse> {
        let body = match self.dialect {
            ApiDialect::Current => json!({"uid": user.uid, "name": user.name}),
            ApiDialect::Legacy => json!({"uid": user.uid, "nome": user.name}),
        };
        self.command(Method::POST, self.endpoints.users, Some(&body))
            .await
    }

    /// Remove a card.
    pub async fn remove_user(&self, uid: &str) -> AppResult<ApiResponse> {
        self.command(Method::DELETE, self.endpoints.users, Some(&json!({"uid": uid})))
            .await
    }

    /// Serve one coffee manually.
    pub async fn serve_coffee(&self) -> AppResult<ApiResponse> {
        self.command(Method::POST, self.endpoints.serve_coffee, None)
            .await
    }

    /// Reset the bottle count to its capacity.
    pub async fn refill_coffee(&self) -> AppResult<ApiResponse> {
        self.command(Method::POST, self.endpoints.refill_coffee, None)
            .await
    }

    /// Restart the device.
    pub async fn system_reset(&self) -> AppResult<ApiResponse> {
        self.command(Method::POST, self.endpoints.system_reset, None)
            .await
    }

    /// Wipe every user and counter.
    pub async fn clear_all_data(&self) -> AppResult<ApiResponse> {
        self.command(Method::DELETE, self.endpoints.clear_data, None)
            .await
    }

    /// Wipe the device log.
    pub async fn clear_logs(&self) -> AppResult<ApiResponse> {
        self.command(Method::DELETE, self.endpoints.logs, None).await
    }

    /// Restore a JSON backup.
    pub async fn restore(&self, backup: &Value) -> AppResult<ApiResponse> {
        self.command(Method::POST, self.endpoints.restore, Some(backup))
            .await
    }

    // ── Plumbing ─────────────────────────────────────────────────

    fn url(&self, path: &str) -> AppResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::internal(format!("Invalid API path '{path}': {e}")))
    }

    fn request(&self, method: Method, path: &str) -> AppResult<RequestBuilder> {
        let mut builder = self.http.request(method, self.url(path)?);
        if let Some(cookie) = self.session_cookie() {
            builder = builder.header(COOKIE, cookie);
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder) -> AppResult<Response> {
        builder.send().await.map_err(network_error)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        debug!(path, "GET");
        let response = self.send(self.request(Method::GET, path)?).await?;
        decode(check_status(response).await?).await
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> AppResult<ApiResponse> {
        debug!(%method, path, "Command");
        let mut builder = self.request(method, path)?;
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = self.send(builder).await?;
        decode(check_status(response).await?).await
    }
}

fn network_error(err: reqwest::Error) -> AppError {
    AppError::with_source(ErrorKind::Network, format!("Request failed: {err}"), err)
}

/// Map 401 and other non-2xx responses to errors.
async fn check_status(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        warn!(url = %response.url(), "Device answered 401");
        return Err(AppError::unauthorized("Autenticação necessária"));
    }

    let body: ApiResponse = response.json().await.unwrap_or_default();
    let message = body
        .message
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16()));
    Err(AppError::application(message))
}

async fn decode<T: DeserializeOwned>(response: Response) -> AppResult<T> {
    let url = response.url().clone();
    response.json::<T>().await.map_err(|e| {
        AppError::with_source(
            ErrorKind::Protocol,
            format!("Unexpected response body from {}: {e}", url.path()),
            e,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> DeviceClient {
        DeviceClient::new(&DeviceConfig {
            base_url: base_url.to_string(),
            ..DeviceConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_websocket_url_follows_scheme() {
        assert_eq!(
            client("http://10.0.0.5").websocket_url("/ws").unwrap(),
            "ws://10.0.0.5/ws"
        );
        assert_eq!(
            client("https://cafe.example:8443").websocket_url("/ws").unwrap(),
            "wss://cafe.example:8443/ws"
        );
    }

    #[test]
    fn test_invalid_base_url_is_configuration_error() {
        let err = DeviceClient::new(&DeviceConfig {
            base_url: "not a url".to_string(),
            ..DeviceConfig::default()
        })
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Configuration);
    }

    #[test]
    fn test_session_cookie_shared_between_clones() {
        let a = client("http://10.0.0.5");
        let b = a.clone();
        assert!(a.session_cookie().is_none());
        b.set_session_id(Some("abc".into()));
        assert_eq!(a.session_cookie().as_deref(), Some("session_id=abc"));
    }
}
