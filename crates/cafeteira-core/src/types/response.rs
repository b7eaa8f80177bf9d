//! Response bodies returned by the device REST API.

use serde::{Deserialize, Serialize};

use super::log::LogEntry;
use super::user::User;
use crate::error::AppError;
use crate::session::{Role, Session};

/// Generic `{success, message?}` body of mutating calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Whether the device performed the operation.
    #[serde(default)]
    pub success: bool,
    /// Optional human-readable outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiResponse {
    /// Turn a `success: false` body into an application error, using the
    /// device's message when present and `fallback` otherwise. Returns the
    /// device's message (or `fallback`) on success.
    pub fn into_result(self, fallback: &str) -> Result<String, AppError> {
        let message = self
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string());
        if self.success {
            Ok(message)
        } else {
            Err(AppError::application(message))
        }
    }
}

/// Body of `GET /auth/check`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthCheck {
    /// Whether the session cookie is valid.
    #[serde(default)]
    pub authenticated: bool,
    /// Login name.
    #[serde(default)]
    pub username: Option<String>,
    /// Role string (`Admin` / `User`).
    #[serde(default)]
    pub role: Option<String>,
    /// Session age in milliseconds.
    #[serde(default)]
    pub session_time: Option<u64>,
}

impl AuthCheck {
    /// Convert into a session when authenticated.
    pub fn into_session(self) -> Option<Session> {
        if !self.authenticated {
            return None;
        }
        let role = self
            .role
            .as_deref()
            .map(Role::from_str_value)
            .unwrap_or(Role::User);
        Some(Session::new(
            self.username.unwrap_or_default(),
            role,
            self.session_time.unwrap_or(0),
        ))
    }
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Whether the credentials were accepted.
    #[serde(default)]
    pub success: bool,
    /// New session id (also set as a cookie).
    #[serde(default)]
    pub session_id: Option<String>,
    /// Granted role.
    #[serde(default)]
    pub role: Option<String>,
    /// Landing page suggested by the device.
    #[serde(default)]
    pub redirect_url: Option<String>,
    /// Failure reason.
    #[serde(default)]
    pub message: Option<String>,
    /// Set when the client IP is temporarily blocked.
    #[serde(default)]
    pub blocked: bool,
}

/// Body of `GET /api/users` (or legacy `GET /api/usuarios`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserListResponse {
    /// Registered users, in device order.
    #[serde(alias = "usuarios", default)]
    pub users: Vec<User>,
}

/// Body of `GET /api/logs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogListResponse {
    /// Log entries, in device order.
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

/// Body of `GET /api/usuario?uid=`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLookup {
    /// Whether the card is registered.
    #[serde(default)]
    pub success: bool,
    /// Card UID.
    #[serde(default)]
    pub uid: Option<String>,
    /// Display name.
    #[serde(alias = "nome", default)]
    pub name: Option<String>,
    /// Remaining credits.
    #[serde(alias = "creditos", default)]
    pub credits: Option<u32>,
    /// Failure reason.
    #[serde(default)]
    pub message: Option<String>,
}
