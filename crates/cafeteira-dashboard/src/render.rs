//! Pure view models built from cached data.
//!
//! Nothing here performs I/O. Every model has a plain-text `Display`
//! used by the terminal front-end.

use std::fmt;

use chrono::{DateTime, Local};

use cafeteira_core::types::{LogEntry, LogLevel, StatusSummary, User};

/// Placeholder shown when no user is registered.
pub const NO_USERS: &str = "Nenhum usuário cadastrado";

/// Placeholder shown when the log buffer is empty.
pub const NO_LOGS: &str = "Nenhum log encontrado";

/// Placeholder for the recent activity panel.
pub const NO_ACTIVITY: &str = "Nenhuma atividade recente";

/// Placeholder for the active users panel.
pub const NO_ACTIVE_USERS: &str = "Nenhum usuário ativo hoje";

/// Per-row control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    /// Remove the card.
    Remove,
}

/// One row of the user list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRow {
    /// Display name.
    pub name: String,
    /// Card UID.
    pub uid: String,
    /// Credits, as displayed.
    pub credits: String,
    /// Controls on the row.
    pub actions: Vec<RowAction>,
}

/// The user list panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserListView {
    /// No users; shows [`NO_USERS`].
    Empty,
    /// One row per user, in device order.
    Rows(Vec<UserRow>),
}

impl UserListView {
    /// Rows, empty for the placeholder.
    pub fn rows(&self) -> &[UserRow] {
        match self {
            Self::Empty => &[],
            Self::Rows(rows) => rows,
        }
    }
}

/// Build the user list panel. Always rebuilt from scratch.
pub fn user_list(users: &[User]) -> UserListView {
    if users.is_empty() {
        return UserListView::Empty;
    }
    UserListView::Rows(
        users
            .iter()
            .map(|user| UserRow {
                name: user.name.clone(),
                uid: user.uid.clone(),
                credits: user.credits.to_string(),
                actions: vec![RowAction::Remove],
            })
            .collect(),
    )
}

impl fmt::Display for UserListView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => writeln!(f, "  {NO_USERS}"),
            Self::Rows(rows) => {
                for row in rows {
                    writeln!(f, "  {:<24} {:<14} {:>4} créditos  [Remover]", row.name, row.uid, row.credits)?;
                }
                Ok(())
            }
        }
    }
}

/// A status light.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicator {
    /// Panel label.
    pub label: &'static str,
    /// Colored dot.
    pub icon: &'static str,
    /// State text.
    pub text: &'static str,
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.icon, self.label, self.text)
    }
}

/// A labelled number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatCard {
    /// Label.
    pub label: &'static str,
    /// Formatted value.
    pub value: String,
}

/// Admin dashboard status panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    /// Busy/online light.
    pub system: Indicator,
    /// Bottle light.
    pub coffee: Indicator,
    /// WiFi light.
    pub wifi: Indicator,
    /// Counters.
    pub cards: Vec<StatCard>,
}

/// Build the admin status panel.
pub fn status_view(summary: &StatusSummary) -> StatusView {
    let system = if summary.is_busy {
        Indicator { label: "Sistema", icon: "🟡", text: "Ocupado" }
    } else {
        Indicator { label: "Sistema", icon: "🟢", text: "Online" }
    };
    let coffee = if summary.is_empty() {
        Indicator { label: "Café", icon: "🔴", text: "Vazio" }
    } else if summary.is_busy {
        Indicator { label: "Café", icon: "🟡", text: "Servindo" }
    } else {
        Indicator { label: "Café", icon: "🟢", text: "Pronto" }
    };
    let wifi = if summary.wifi_connected {
        Indicator { label: "WiFi", icon: "🟢", text: "Conectado" }
    } else {
        Indicator { label: "WiFi", icon: "🔴", text: "Desconectado" }
    };

    let cards = vec![
        StatCard { label: "Usuários Cadastrados", value: summary.total_users.to_string() },
        StatCard { label: "Cafés Servidos", value: summary.total_served.to_string() },
        StatCard { label: "Cafés Restantes", value: summary.remaining.max(0).to_string() },
        StatCard { label: "Usuários Ativos Hoje", value: summary.active_today.to_string() },
        StatCard { label: "Sessões Ativas", value: summary.active_sessions.to_string() },
        StatCard { label: "Tempo Ativo", value: format_uptime(summary.uptime_ms) },
    ];

    StatusView { system, coffee, wifi, cards }
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {}   {}   {}", self.system, self.coffee, self.wifi)?;
        for card in &self.cards {
            writeln!(f, "  {:<22} {}", card.label, card.value)?;
        }
        Ok(())
    }
}

/// Single-page status panel of the legacy firmware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyStatusView {
    /// "Sistema Ativo" / "Sistema Ocupado".
    pub headline: &'static str,
    /// Registered users.
    pub total_users: String,
    /// Coffees served.
    pub total_served: String,
    /// `remaining / capacity`.
    pub remaining: String,
    /// Last device event.
    pub last_event: String,
}

/// Build the legacy single-page status panel.
pub fn legacy_status_view(summary: &StatusSummary) -> LegacyStatusView {
    LegacyStatusView {
        headline: if summary.is_busy { "Sistema Ocupado" } else { "Sistema Ativo" },
        total_users: summary.total_users.to_string(),
        total_served: summary.total_served.to_string(),
        remaining: format!("{} / {}", summary.remaining.max(0), summary.max_capacity.unwrap_or(0)),
        last_event: summary
            .last_event
            .clone()
            .unwrap_or_else(|| "Aguardando eventos...".to_string()),
    }
}

impl fmt::Display for LegacyStatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  {}", self.headline)?;
        writeln!(f, "  Usuários: {}   Cafés servidos: {}   Restantes: {}", self.total_users, self.total_served, self.remaining)?;
        writeln!(f, "  Último evento: {}", self.last_event)
    }
}

/// One log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// `HH:MM:SS`.
    pub time: String,
    /// Level.
    pub level: LogLevel,
    /// Activity icon.
    pub icon: &'static str,
    /// Message.
    pub message: String,
    /// Extra details.
    pub details: Option<String>,
}

/// Build a log line. Plain-text entries carry no time and show `now`.
pub fn log_line(entry: &LogEntry, now: DateTime<Local>) -> LogLine {
    let time = match entry {
        LogEntry::Text(_) => now.format("%H:%M:%S").to_string(),
        LogEntry::Structured(_) => entry
            .timestamp()
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string()),
    };
    LogLine {
        time,
        level: entry.level(),
        icon: activity_icon(entry),
        message: entry.message().to_string(),
        details: entry.details(),
    }
}

/// Build log lines, newest first.
pub fn log_lines<'a>(entries: impl IntoIterator<Item = &'a LogEntry>, now: DateTime<Local>) -> Vec<LogLine> {
    entries.into_iter().map(|e| log_line(e, now)).collect()
}

/// Icon for the recent activity panel.
pub fn activity_icon(entry: &LogEntry) -> &'static str {
    match entry {
        LogEntry::Text(text) => {
            if text.contains("CAFÉ") || text.contains("COFFEE") {
                "☕"
            } else if text.contains("LOGIN") {
                "🔑"
            } else if text.contains("USUÁRIO") || text.contains("USER") {
                "👤"
            } else if text.contains("ERROR") || text.contains("ERRO") {
                "❌"
            } else if text.contains("WARN") {
                "⚠️"
            } else {
                "ℹ️"
            }
        }
        LogEntry::Structured(_) => match entry.level() {
            LogLevel::Error | LogLevel::Critical => "❌",
            LogLevel::Warning => "⚠️",
            LogLevel::Success => "✅",
            LogLevel::Debug | LogLevel::Info => "ℹ️",
        },
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  {} {} {:<8} {}",
            self.time,
            self.icon,
            self.level.as_str().to_uppercase(),
            self.message
        )?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

/// Card of a user active today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUserCard {
    /// First letter of the name.
    pub avatar: String,
    /// Name.
    pub name: String,
    /// `"<n> créditos"`.
    pub credits: String,
}

/// Users with credits that used their card today, at most six.
pub fn active_users(users: &[User], now: DateTime<Local>) -> Vec<ActiveUserCard> {
    users
        .iter()
        .filter(|u| u.is_active && u.credits > 0 && u.is_active_today(now))
        .take(6)
        .map(|u| ActiveUserCard {
            avatar: u.name.chars().next().map(|c| c.to_uppercase().collect()).unwrap_or_default(),
            name: u.name.clone(),
            credits: format!("{} créditos", u.credits),
        })
        .collect()
}

/// `1d 2h 3m`, `2h 3m`, `3m 4s` or `4s`.
pub fn format_uptime(uptime_ms: u64) -> String {
    let seconds = uptime_ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{days}d {}h {}m", hours % 24, minutes % 60)
    } else if hours > 0 {
        format!("{hours}h {}m", minutes % 60)
    } else if minutes > 0 {
        format!("{minutes}m {}s", seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn users(value: serde_json::Value) -> Vec<User> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_single_legacy_user_renders_one_row() {
        let list: cafeteira_core::types::UserListResponse =
            serde_json::from_value(json!({"usuarios": [{"uid": "AB12", "nome": "Joana", "creditos": 3}]})).unwrap();
        let view = user_list(&list.users);

        assert_eq!(
            view.rows(),
            &[UserRow {
                name: "Joana".into(),
                uid: "AB12".into(),
                credits: "3".into(),
                actions: vec![RowAction::Remove],
            }]
        );
        assert!(view.to_string().contains("Joana"));
    }

    #[test]
    fn test_empty_user_list_placeholder() {
        let view = user_list(&[]);
        assert_eq!(view, UserListView::Empty);
        assert_eq!(view.to_string().trim(), NO_USERS);
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let list = users(json!([{"uid": "AB12", "name": "Joana", "credits": 3}]));
        assert_eq!(user_list(&list), user_list(&list));
    }

    #[test]
    fn test_indicators() {
        let mut summary = StatusSummary { remaining: 0, wifi_connected: true, ..Default::default() };
        let view = status_view(&summary);
        assert_eq!(view.coffee.text, "Vazio");
        assert_eq!(view.system.text, "Online");
        assert_eq!(view.wifi.text, "Conectado");

        summary.remaining = 4;
        summary.is_busy = true;
        let view = status_view(&summary);
        assert_eq!(view.coffee.text, "Servindo");
        assert_eq!(view.system.text, "Ocupado");
    }

    #[test]
    fn test_legacy_panel() {
        let summary = StatusSummary {
            remaining: 3,
            max_capacity: Some(10),
            ..Default::default()
        };
        let view = legacy_status_view(&summary);
        assert_eq!(view.headline, "Sistema Ativo");
        assert_eq!(view.remaining, "3 / 10");
        assert_eq!(view.last_event, "Aguardando eventos...");
    }

    #[test]
    fn test_log_lines() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let text = log_line(&LogEntry::from("[ERRO] Falha no leitor"), now);
        assert_eq!(text.time, "14:05:00");
        assert_eq!(text.level, LogLevel::Error);
        assert_eq!(text.icon, "❌");

        let entry: LogEntry = serde_json::from_value(json!({"level": "success", "message": "ok"})).unwrap();
        let structured = log_line(&entry, now);
        assert_eq!(structured.time, "--:--:--");
        assert_eq!(structured.icon, "✅");

        assert_eq!(activity_icon(&LogEntry::from("CAFÉ servido")), "☕");
    }

    #[test]
    fn test_active_users_filter() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let today = now.timestamp_millis() - 60_000;
        let list = users(json!([
            {"uid": "A", "name": "ana", "credits": 2, "lastUsed": today},
            {"uid": "B", "name": "Bia", "credits": 0, "lastUsed": today},
            {"uid": "C", "name": "Caio", "credits": 2}
        ]));
        let cards = active_users(&list, now);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].avatar, "A");
        assert_eq!(cards[0].credits, "2 créditos");
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(4_000), "4s");
        assert_eq!(format_uptime(65_000), "1m 5s");
        assert_eq!(format_uptime(3_660_000), "1h 1m");
        assert_eq!(format_uptime(90_000_000), "1d 1h 0m");
    }
}
