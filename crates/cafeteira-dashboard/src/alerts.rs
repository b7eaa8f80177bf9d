//! Alert sink: stacked transient messages with auto-dismiss.
//!
//! Each alert owns an auto-hide timer task. Dismissing an alert by hand,
//! or clearing the sink, aborts its timer. Subscribers see every alert
//! being shown and dismissed.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use cafeteira_core::config::AlertConfig;

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Error,
    /// Something needs attention.
    Warning,
    /// Informational.
    Info,
}

impl Severity {
    /// Parse a severity name; unknown names are treated as info.
    pub fn from_str_value(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "success" => Self::Success,
            "error" => Self::Error,
            "warning" | "warn" => Self::Warning,
            _ => Self::Info,
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    /// Heading shown above the message.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Success => "Sucesso",
            Self::Error => "Erro",
            Self::Warning => "Atenção",
            Self::Info => "Informação",
        }
    }

    /// Icon shown next to the heading.
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Success => "✅",
            Self::Error => "❌",
            Self::Warning => "⚠️",
            Self::Info => "ℹ️",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One visible alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Alert ID.
    pub id: Uuid,
    /// Severity.
    pub severity: Severity,
    /// Message text.
    pub message: String,
    /// When the alert was shown.
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.severity.icon(),
            self.severity.title(),
            self.message
        )
    }
}

/// Change to the visible alert stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEvent {
    /// An alert was added at the bottom of the stack.
    Shown(Alert),
    /// An alert was removed.
    Dismissed(Uuid),
}

struct Entry {
    alert: Alert,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    auto_hide: Duration,
    entries: Mutex<Vec<Entry>>,
    events: broadcast::Sender<AlertEvent>,
}

/// Shared alert stack. Cheap to clone.
#[derive(Clone)]
pub struct AlertSink {
    inner: Arc<Inner>,
}

impl fmt::Debug for AlertSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertSink")
            .field("auto_hide", &self.inner.auto_hide)
            .field("active", &self.len())
            .finish()
    }
}

impl AlertSink {
    /// Create an empty sink.
    pub fn new(config: &AlertConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                auto_hide: Duration::from_millis(config.auto_hide_delay_ms),
                entries: Mutex::new(Vec::new()),
                events,
            }),
        }
    }

    /// Show an alert that hides itself after the configured delay.
    pub fn show(&self, severity: Severity, message: impl Into<String>) -> Uuid {
        self.push(severity, message.into(), true)
    }

    /// Show an alert that stays until dismissed.
    pub fn show_sticky(&self, severity: Severity, message: impl Into<String>) -> Uuid {
        self.push(severity, message.into(), false)
    }

    /// Show a success alert.
    pub fn success(&self, message: impl Into<String>) -> Uuid {
        self.show(Severity::Success, message)
    }

    /// Show an error alert.
    pub fn error(&self, message: impl Into<String>) -> Uuid {
        self.show(Severity::Error, message)
    }

    /// Show a warning alert.
    pub fn warning(&self, message: impl Into<String>) -> Uuid {
        self.show(Severity::Warning, message)
    }

    /// Show an info alert.
    pub fn info(&self, message: impl Into<String>) -> Uuid {
        self.show(Severity::Info, message)
    }

    /// Dismiss one alert, keeping the others in order.
    /// Returns `false` if it was already gone.
    pub fn dismiss(&self, id: Uuid) -> bool {
        self.remove(id, true)
    }

    /// Visible alerts, oldest first.
    pub fn active(&self) -> Vec<Alert> {
        self.entries().iter().map(|e| e.alert.clone()).collect()
    }

    /// Number of visible alerts.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether no alert is visible.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dismiss everything and abort all timers.
    pub fn clear(&self) {
        let drained: Vec<Entry> = self.entries().drain(..).collect();
        for entry in drained {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
            let _ = self.inner.events.send(AlertEvent::Dismissed(entry.alert.id));
        }
    }

    /// Subscribe to stack changes.
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.inner.events.subscribe()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.inner.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, severity: Severity, message: String, auto_hide: bool) -> Uuid {
        let alert = Alert {
            id: Uuid::new_v4(),
            severity,
            message,
            created_at: Utc::now(),
        };
        let id = alert.id;
        debug!(alert_id = %id, severity = %severity, message = %alert.message, "Alert shown");

        self.entries().push(Entry {
            alert: alert.clone(),
            timer: None,
        });
        let _ = self.inner.events.send(AlertEvent::Shown(alert));

        if auto_hide {
            let timer = spawn_auto_hide(Arc::downgrade(&self.inner), id, self.inner.auto_hide);
            let mut entries = self.entries();
            match entries.iter_mut().find(|e| e.alert.id == id) {
                Some(entry) => entry.timer = Some(timer),
                None => timer.abort(),
            }
        }

        id
    }

    fn remove(&self, id: Uuid, abort_timer: bool) -> bool {
        let removed = {
            let mut entries = self.entries();
            let Some(index) = entries.iter().position(|e| e.alert.id == id) else {
                return false;
            };
            entries.remove(index)
        };
        if abort_timer {
            if let Some(timer) = removed.timer {
                timer.abort();
            }
        }
        let _ = self.inner.events.send(AlertEvent::Dismissed(id));
        true
    }
}

fn spawn_auto_hide(inner: Weak<Inner>, id: Uuid, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(inner) = inner.upgrade() {
            AlertSink { inner }.remove(id, false);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink() -> AlertSink {
        AlertSink::new(&AlertConfig::default())
    }

    fn messages(sink: &AlertSink) -> Vec<String> {
        sink.active().into_iter().map(|a| a.message).collect()
    }

    #[test]
    fn test_severity_titles_and_fallback() {
        assert_eq!(Severity::from_str_value("warning").title(), "Atenção");
        assert_eq!(Severity::from_str_value("ERROR"), Severity::Error);
        assert_eq!(Severity::from_str_value("fatal"), Severity::Info);
        assert_eq!(Severity::Success.icon(), "✅");
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_auto_dismisses_after_delay() {
        let sink = sink();
        sink.success("Garrafa reabastecida!");
        assert_eq!(sink.len(), 1);

        tokio::time::sleep(Duration::from_millis(4_999)).await;
        assert_eq!(sink.len(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(sink.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_preserves_order_of_the_rest() {
        let sink = sink();
        sink.info("a");
        let b = sink.info("b");
        sink.info("c");

        assert!(sink.dismiss(b));
        assert_eq!(messages(&sink), vec!["a", "c"]);
        assert!(!sink.dismiss(b));
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_dismiss_aborts_timer() {
        let sink = sink();
        let mut events = sink.subscribe();
        let id = sink.error("sem café");
        sink.dismiss(id);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(matches!(events.recv().await.unwrap(), AlertEvent::Shown(_)));
        assert_eq!(events.recv().await.unwrap(), AlertEvent::Dismissed(id));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sticky_alert_stays_until_cleared() {
        let sink = sink();
        sink.show_sticky(Severity::Warning, "Conexão perdida. Tentando reconectar...");
        sink.info("x");

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(messages(&sink), vec!["Conexão perdida. Tentando reconectar..."]);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_display() {
        let alert = Alert {
            id: Uuid::nil(),
            severity: Severity::Success,
            message: "Café servido para Ana".into(),
            created_at: Utc::now(),
        };
        assert_eq!(alert.to_string(), "✅ Sucesso: Café servido para Ana");
    }
}
