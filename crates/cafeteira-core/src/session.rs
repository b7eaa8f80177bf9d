//! Authenticated session and the process-wide session store.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Role granted to a logged-in operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Full control: user CRUD, refill, reset, logs.
    Admin,
    /// Read-only dashboard.
    User,
}

impl Role {
    /// Parse the role string returned by the device. Anything that is not
    /// `Admin` is treated as a regular user.
    pub fn from_str_value(s: &str) -> Self {
        if s.eq_ignore_ascii_case("admin") {
            Self::Admin
        } else {
            Self::User
        }
    }

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::User => "User",
        }
    }

    /// Landing route for this role after login.
    pub fn dashboard_route(&self) -> &'static str {
        match self {
            Self::Admin => "/admin/dashboard",
            Self::User => "/user/dashboard",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated operator, as reported by `/auth/check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Login name.
    pub username: String,
    /// Granted role.
    pub role: Role,
    /// Milliseconds since the session was created on the device.
    pub session_time_ms: u64,
}

impl Session {
    /// Create a session snapshot.
    pub fn new(username: impl Into<String>, role: Role, session_time_ms: u64) -> Self {
        Self {
            username: username.into(),
            role,
            session_time_ms,
        }
    }

    /// Whether the operator may use admin commands.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Upper-cased first letter of the username, used as an avatar.
    pub fn avatar(&self) -> String {
        self.username
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default()
    }
}

/// Shared, observable holder of the current session.
///
/// Cleared on logout and on any 401; the realtime connection manager
/// watches it to decide whether a dropped socket should be retried.
#[derive(Debug, Clone)]
pub struct SessionStore {
    /// Current session (None = logged out).
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl SessionStore {
    /// Create an empty (logged out) store.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Install a session.
    pub fn set(&self, session: Session) {
        self.tx.send_replace(Some(session));
    }

    /// Clear the session. Returns `true` if one was present.
    pub fn clear(&self) -> bool {
        self.tx.send_replace(None).is_some()
    }

    /// Snapshot of the current session.
    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    /// Whether a session is installed.
    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Subscribe to session changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.tx.subscribe()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!(Role::from_str_value("Admin"), Role::Admin);
        assert_eq!(Role::from_str_value("admin"), Role::Admin);
        assert_eq!(Role::from_str_value("User"), Role::User);
        assert_eq!(Role::from_str_value("guest"), Role::User);
        assert_eq!(Role::Admin.dashboard_route(), "/admin/dashboard");
    }

    #[test]
    fn test_avatar_is_uppercase_initial() {
        let session = Session::new("joana", Role::User, 0);
        assert_eq!(session.avatar(), "J");
        assert_eq!(Session::new("", Role::User, 0).avatar(), "");
    }

    #[tokio::test]
    async fn test_store_notifies_subscribers() {
        let store = SessionStore::new();
        let mut rx = store.subscribe();
        assert!(!store.is_authenticated());

        store.set(Session::new("admin", Role::Admin, 42));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref().map(|s| s.role), Some(Role::Admin));

        assert!(store.clear());
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
        assert!(!store.clear());
    }
}
