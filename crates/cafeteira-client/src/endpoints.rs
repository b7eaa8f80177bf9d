//! Route table for each firmware dialect.

use cafeteira_core::config::ApiDialect;

/// REST paths used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    /// Login (form POST).
    pub login: &'static str,
    /// Logout.
    pub logout: &'static str,
    /// Session check.
    pub auth_check: &'static str,
    /// System status.
    pub status: &'static str,
    /// User collection (GET list, POST add, DELETE remove).
    pub users: &'static str,
    /// Single user lookup by `uid` query parameter.
    pub user_lookup: &'static str,
    /// Manual serve.
    pub serve_coffee: &'static str,
    /// Bottle refill.
    pub refill_coffee: &'static str,
    /// Device restart.
    pub system_reset: &'static str,
    /// Wipe all users and counters.
    pub clear_data: &'static str,
    /// Backup payload.
    pub backup: &'static str,
    /// Restore from a JSON backup.
    pub restore: &'static str,
    /// Log list (GET) and log wipe (DELETE).
    pub logs: &'static str,
    /// Usage statistics.
    pub stats: &'static str,
}

impl Endpoints {
    /// Route table for a dialect.
    pub const fn for_dialect(dialect: ApiDialect) -> Self {
        match dialect {
            ApiDialect::Current => Self {
                users: "/api/users",
                serve_coffee: "/api/serve-coffee",
                ..Self::SHARED
            },
            ApiDialect::Legacy => Self {
                users: "/api/usuarios",
                serve_coffee: "/api/servir-cafe",
                ..Self::SHARED
            },
        }
    }

    const SHARED: Self = Self {
        login: "/auth/login",
        logout: "/auth/logout",
        auth_check: "/auth/check",
        status: "/api/status",
        users: "/api/users",
        user_lookup: "/api/usuario",
        serve_coffee: "/api/serve-coffee",
        refill_coffee: "/api/refill-coffee",
        system_reset: "/api/system-reset",
        clear_data: "/api/limpar-dados",
        backup: "/api/backup",
        restore: "/api/restore",
        logs: "/api/logs",
        stats: "/api/stats",
    };
}
