//! Typed view over the device's `/api/status` object.
//!
//! The dashboard keeps the raw status object so partial realtime pushes can
//! be merged into it; this summary is derived from it on every render.
//! Both the nested current layout (`coffee.remaining`, `system.uptime`) and
//! the flat legacy layout (`cafes_restantes`, `sistema_ocupado`) are read.

use serde::Serialize;
use serde_json::{Map, Value};

/// Flattened device status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    /// Firmware version.
    pub version: Option<String>,
    /// Device uptime in milliseconds.
    pub uptime_ms: u64,
    /// Free heap in bytes.
    pub free_heap: Option<u64>,
    /// Whether the device reports a WiFi link.
    pub wifi_connected: bool,
    /// Device IP address.
    pub wifi_ip: Option<String>,
    /// Coffees served since the last reset.
    pub total_served: u64,
    /// Coffees left in the bottle.
    pub remaining: i64,
    /// Bottle capacity.
    pub max_capacity: Option<u64>,
    /// Whether the dispenser is busy serving.
    pub is_busy: bool,
    /// Registered users.
    pub total_users: u64,
    /// User capacity.
    pub max_users: Option<u64>,
    /// Users that used their card today.
    pub active_today: u64,
    /// Open web sessions.
    pub active_sessions: u64,
    /// Last device event (legacy firmware only).
    pub last_event: Option<String>,
}

impl StatusSummary {
    /// Derive the summary from a raw status object.
    pub fn from_stats(stats: &Map<String, Value>) -> Self {
        Self {
            version: text(stats, &["system", "version"]),
            uptime_ms: unsigned(stats, &["system", "uptime"]).unwrap_or(0),
            free_heap: unsigned(stats, &["system", "freeHeap"]),
            wifi_connected: boolean(stats, &["system", "wifiConnected"]).unwrap_or(false),
            wifi_ip: text(stats, &["system", "wifiIP"]),
            total_served: unsigned(stats, &["coffee", "totalServed"])
                .or_else(|| unsigned(stats, &["total_cafes_servidos"]))
                .unwrap_or(0),
            remaining: signed(stats, &["coffee", "remaining"])
                .or_else(|| signed(stats, &["cafes_restantes"]))
                .unwrap_or(0),
            max_capacity: unsigned(stats, &["coffee", "maxCapacity"])
                .or_else(|| unsigned(stats, &["max_cafes"])),
            is_busy: boolean(stats, &["coffee", "isBusy"])
                .or_else(|| boolean(stats, &["sistema_ocupado"]))
                .unwrap_or(false),
            total_users: unsigned(stats, &["users", "total"])
                .or_else(|| unsigned(stats, &["total_usuarios"]))
                .unwrap_or(0),
            max_users: unsigned(stats, &["users", "maxUsers"]),
            active_today: unsigned(stats, &["users", "activeToday"]).unwrap_or(0),
            active_sessions: unsigned(stats, &["auth", "activeSessions"]).unwrap_or(0),
            last_event: text(stats, &["ultimo_evento"]),
        }
    }

    /// Whether the bottle is empty.
    pub fn is_empty(&self) -> bool {
        self.remaining <= 0
    }
}

fn lookup<'a>(stats: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = stats.get(*first)?;
    for key in rest {
        current = current.get(*key)?;
    }
    Some(current)
}

fn unsigned(stats: &Map<String, Value>, path: &[&str]) -> Option<u64> {
    lookup(stats, path).and_then(Value::as_u64)
}

fn signed(stats: &Map<String, Value>, path: &[&str]) -> Option<i64> {
    lookup(stats, path).and_then(Value::as_i64)
}

fn boolean(stats: &Map<String, Value>, path: &[&str]) -> Option<bool> {
    lookup(stats, path).and_then(Value::as_bool)
}

fn text(stats: &Map<String, Value>, path: &[&str]) -> Option<String> {
    lookup(stats, path)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
