//! Cached dashboard data: raw stats, user list, bounded log buffer.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde_json::{Map, Value};

use cafeteira_core::types::{LogEntry, StatusSummary, User};

/// Newest-first log buffer with a fixed capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogBuffer {
    /// Create an empty buffer holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add an entry at the front, evicting the oldest past capacity.
    pub fn push_front(&mut self, entry: LogEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.capacity);
    }

    /// Replace the contents with a newest-first list from the device.
    pub fn replace(&mut self, entries: impl IntoIterator<Item = LogEntry>) {
        self.entries = entries.into_iter().take(self.capacity).collect();
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Everything the dashboard shows, as last fetched or pushed.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    /// Raw status object; realtime pushes merge into it.
    pub stats: Map<String, Value>,
    /// Registered users, in device order.
    pub users: Vec<User>,
    /// Recent log lines.
    pub logs: LogBuffer,
    /// Last unregistered card scanned at the reader.
    pub scanned_uid: Option<String>,
    /// Time of the last full refresh.
    pub refreshed_at: Option<DateTime<Local>>,
}

impl DashboardSnapshot {
    /// Create an empty snapshot.
    pub fn new(log_capacity: usize) -> Self {
        Self {
            stats: Map::new(),
            users: Vec::new(),
            logs: LogBuffer::new(log_capacity),
            scanned_uid: None,
            refreshed_at: None,
        }
    }

    /// Typed view over `stats`.
    pub fn summary(&self) -> StatusSummary {
        StatusSummary::from_stats(&self.stats)
    }

    /// Shallow merge (`{...stats, ...partial}`).
    pub fn merge_stats(&mut self, partial: Map<String, Value>) {
        self.stats.extend(partial);
    }

    /// Account for one served coffee without asking the device.
    ///
    /// Applies to whichever layout the cached stats use. Returns `false`
    /// when there is nothing to update.
    pub fn record_coffee_served(&mut self) -> bool {
        if let Some(Value::Object(coffee)) = self.stats.get_mut("coffee") {
            bump_counters(coffee, "remaining", "totalServed");
            return true;
        }
        if self.stats.contains_key("cafes_restantes") {
            bump_counters(&mut self.stats, "cafes_restantes", "total_cafes_servidos");
            return true;
        }
        false
    }

    /// Merge changes into the user with `uid`. Returns `false` when the
    /// user is not listed or the change is invalid.
    pub fn patch_user(&mut self, uid: &str, changes: &Map<String, Value>) -> bool {
        self.users
            .iter_mut()
            .find(|u| u.uid == uid)
            .is_some_and(|user| user.apply_patch(changes))
    }

    /// Forget everything (logout, 401).
    pub fn clear(&mut self) {
        self.stats.clear();
        self.users.clear();
        self.logs.clear();
        self.scanned_uid = None;
        self.refreshed_at = None;
    }
}

fn bump_counters(object: &mut Map<String, Value>, remaining_key: &str, served_key: &str) {
    let remaining = object.get(remaining_key).and_then(Value::as_i64).unwrap_or(0);
    let served = object.get(served_key).and_then(Value::as_i64).unwrap_or(0);
    object.insert(remaining_key.to_string(), Value::from((remaining - 1).max(0)));
    object.insert(served_key.to_string(), Value::from(served + 1));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_log_buffer_keeps_newest_hundred() {
        let mut logs = LogBuffer::new(100);
        for i in 0..101 {
            logs.push_front(LogEntry::Text(format!("linha {i}")));
        }
        assert_eq!(logs.len(), 100);
        assert_eq!(logs.iter().next().unwrap().message(), "linha 100");
        assert_eq!(logs.iter().last().unwrap().message(), "linha 1");
    }

    #[test]
    fn test_log_replace_truncates() {
        let mut logs = LogBuffer::new(2);
        logs.replace(["a", "b", "c"].map(LogEntry::from));
        assert_eq!(logs.len(), 2);
        assert_eq!(logs.iter().next().unwrap().message(), "a");
    }

    #[test]
    fn test_merge_stats_is_shallow() {
        let mut snapshot = DashboardSnapshot::new(100);
        snapshot.stats = object(json!({"coffee": {"remaining": 3, "totalServed": 7}, "system": {"uptime": 1}}));
        snapshot.merge_stats(object(json!({"system": {"uptime": 2}})));

        assert_eq!(snapshot.stats["system"], json!({"uptime": 2}));
        assert_eq!(snapshot.summary().remaining, 3);
    }

    #[test]
    fn test_coffee_served_floors_at_zero() {
        let mut snapshot = DashboardSnapshot::new(100);
        snapshot.stats = object(json!({"coffee": {"remaining": 1, "totalServed": 7}}));

        assert!(snapshot.record_coffee_served());
        assert!(snapshot.record_coffee_served());
        let summary = snapshot.summary();
        assert_eq!(summary.remaining, 0);
        assert_eq!(summary.total_served, 9);
    }

    #[test]
    fn test_coffee_served_legacy_layout_and_empty_stats() {
        let mut snapshot = DashboardSnapshot::new(100);
        assert!(!snapshot.record_coffee_served());

        snapshot.stats = object(json!({"cafes_restantes": 4, "total_cafes_servidos": 1}));
        assert!(snapshot.record_coffee_served());
        assert_eq!(snapshot.stats["cafes_restantes"], json!(3));
        assert_eq!(snapshot.stats["total_cafes_servidos"], json!(2));
    }

    #[test]
    fn test_patch_user_by_uid() {
        let mut snapshot = DashboardSnapshot::new(100);
        snapshot.users = serde_json::from_value(json!([
            {"uid": "AB12", "name": "Joana", "credits": 3},
            {"uid": "CD34", "name": "Ana", "credits": 1}
        ]))
        .unwrap();

        assert!(snapshot.patch_user("CD34", &object(json!({"credits": 0, "lastUsed": 1000}))));
        assert_eq!(snapshot.users[1].credits, 0);
        assert_eq!(snapshot.users[1].last_used, Some(1000));
        assert_eq!(snapshot.users[0].credits, 3);
        assert!(!snapshot.patch_user("ZZ99", &object(json!({"credits": 5}))));
    }
}
