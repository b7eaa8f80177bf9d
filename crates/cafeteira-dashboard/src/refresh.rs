//! View refresh coordinator.
//!
//! Keeps the snapshot current in three ways:
//!
//! - full refreshes, which refetch every panel of the active view and
//!   replace the cached data;
//! - periodic polling of the active view, suspended while the view is
//!   hidden or auto-refresh is paused;
//! - targeted updates from realtime pushes, which touch one panel and
//!   never call the REST API.
//!
//! A 401 from any call clears the session and the snapshot and emits a
//! navigation to the login route.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use cafeteira_client::DeviceClient;
use cafeteira_core::config::RefreshConfig;
use cafeteira_core::error::{AppError, ErrorKind};
use cafeteira_core::session::{Role, SessionStore};
use cafeteira_core::types::LogEntry;
use cafeteira_core::AppResult;
use cafeteira_realtime::InboundMessage;

use crate::alerts::{AlertSink, Severity};
use crate::snapshot::DashboardSnapshot;

/// A page of the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Single-page status view of the legacy firmware: status and users.
    Status,
    /// Admin dashboard: status, users and recent activity.
    Dashboard,
    /// Admin log viewer.
    Logs,
}

impl ViewKind {
    /// Polling period.
    pub fn interval(&self, config: &RefreshConfig) -> Duration {
        let secs = match self {
            Self::Status => config.status_interval_secs,
            Self::Dashboard => config.dashboard_interval_secs,
            Self::Logs => config.logs_interval_secs,
        };
        Duration::from_secs(secs.max(1))
    }

    /// Whether only admins may open the view.
    pub fn requires_admin(&self) -> bool {
        matches!(self, Self::Dashboard | Self::Logs)
    }

    /// Alert shown when a full refresh fails without a device message.
    fn failure_message(&self) -> &'static str {
        match self {
            Self::Status => "Erro na comunicação com o dispositivo",
            Self::Dashboard => "Erro ao carregar dados do dashboard",
            Self::Logs => "Erro ao carregar logs",
        }
    }
}

/// A region of a view that can be redrawn on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Panel {
    /// Status indicators and counters.
    Status,
    /// The whole user list.
    Users,
    /// One user row.
    UserRow(String),
    /// Log lines.
    Logs,
}

/// Where the front-end should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Login page.
    Login,
    /// Landing page for a role.
    Dashboard(Role),
}

impl Route {
    /// URL path of the route.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Login => "/",
            Self::Dashboard(role) => role.dashboard_route(),
        }
    }
}

/// Notifications for the front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// A panel changed and should be redrawn.
    Rendered(Panel),
    /// Navigate away from the current view.
    Navigate(Route),
    /// An unregistered card was scanned; prefill the add-user form.
    ScannedUid(String),
}

/// Polling bookkeeping.
#[derive(Debug)]
struct PollState {
    view: Option<ViewKind>,
    visible: bool,
    auto_refresh: bool,
    task: Option<JoinHandle<()>>,
}

/// Coordinates full refreshes, polling and push updates.
#[derive(Debug)]
pub struct RefreshCoordinator {
    /// REST client.
    client: DeviceClient,
    /// Cached data.
    snapshot: Arc<RwLock<DashboardSnapshot>>,
    /// Alert sink.
    alerts: AlertSink,
    /// Session store, cleared on 401.
    session: SessionStore,
    /// Intervals and limits.
    config: RefreshConfig,
    /// Front-end notifications.
    events: broadcast::Sender<ViewEvent>,
    /// Polling state.
    poll: Mutex<PollState>,
}

impl RefreshCoordinator {
    /// Create a coordinator with an empty snapshot.
    pub fn new(client: DeviceClient, alerts: AlertSink, session: SessionStore, config: RefreshConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        let auto_refresh = config.auto_refresh;
        Self {
            client,
            snapshot: Arc::new(RwLock::new(DashboardSnapshot::new(config.log_buffer_capacity))),
            alerts,
            session,
            config,
            events,
            poll: Mutex::new(PollState {
                view: None,
                visible: true,
                auto_refresh,
                task: None,
            }),
        }
    }

    /// Subscribe to front-end notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    /// Copy of the cached data.
    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Active view.
    pub fn current_view(&self) -> Option<ViewKind> {
        self.poll_state().view
    }

    /// Whether a polling task is running.
    pub fn is_polling(&self) -> bool {
        self.poll_state()
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Whether auto-refresh is enabled.
    pub fn auto_refresh_enabled(&self) -> bool {
        self.poll_state().auto_refresh
    }

    // ── Full refresh ─────────────────────────────────────────────

    /// Refetch every panel of `view` and replace the cached data.
    ///
    /// All requests run concurrently; the snapshot is only touched when
    /// they all succeed. Failures are reported to the alert sink.
    pub async fn full_refresh(&self, view: ViewKind) -> AppResult<()> {
        debug!(view = ?view, "Full refresh");
        let result = match view {
            ViewKind::Status => self.fetch_status_and_users(None).await,
            ViewKind::Dashboard => {
                self.fetch_status_and_users(Some(self.config.recent_logs_limit))
                    .await
            }
            ViewKind::Logs => self
                .client
                .logs(Some(self.config.logs_page_limit))
                .await
                .map(|logs| (None, Some(logs))),
        };

        match result {
            Ok((status_and_users, logs)) => {
                let mut panels = Vec::new();
                {
                    let mut snapshot = self.snapshot.write().await;
                    if let Some((stats, users)) = status_and_users {
                        snapshot.stats = stats;
                        snapshot.users = users;
                        panels.push(Panel::Status);
                        panels.push(Panel::Users);
                    }
                    if let Some(logs) = logs {
                        snapshot.logs.replace(logs);
                        panels.push(Panel::Logs);
                    }
                    snapshot.refreshed_at = Some(Local::now());
                }
                for panel in panels {
                    self.emit(ViewEvent::Rendered(panel));
                }
                Ok(())
            }
            Err(e) => {
                let fallback = match (view, e.kind) {
                    (ViewKind::Status, ErrorKind::Network) => {
                        format!("{}: {}", view.failure_message(), e.message)
                    }
                    _ => view.failure_message().to_string(),
                };
                Err(self.report(e, &fallback).await)
            }
        }
    }

    async fn fetch_status_and_users(
        &self,
        logs_limit: Option<u32>,
    ) -> AppResult<(Option<StatusAndUsers>, Option<Vec<LogEntry>>)> {
        let logs = async {
            match logs_limit {
                Some(limit) => self.client.logs(Some(limit)).await.map(Some),
                None => Ok(None),
            }
        };
        let (stats, users, logs) =
            tokio::try_join!(self.client.status(), self.client.list_users(), logs)?;
        Ok((Some((stats, users)), logs))
    }

    /// Refresh the active view on request.
    pub async fn refresh_now(&self) -> AppResult<()> {
        if self.refresh_active().await? {
            self.alerts.info("Dados atualizados manualmente");
        }
        Ok(())
    }

    /// Full refresh of the active view, if any. Returns whether a view
    /// was refreshed.
    pub async fn refresh_active(&self) -> AppResult<bool> {
        let Some(view) = self.current_view() else {
            return Ok(false);
        };
        self.full_refresh(view).await?;
        Ok(true)
    }

    /// Drop the cached log lines.
    pub async fn clear_logs(&self) {
        self.snapshot.write().await.logs.clear();
        self.emit(ViewEvent::Rendered(Panel::Logs));
    }

    // ── Errors ───────────────────────────────────────────────────

    /// Surface an error: 401 resets the session, device messages are
    /// shown verbatim, anything else shows `fallback`. Returns the error.
    pub async fn report(&self, err: AppError, fallback: &str) -> AppError {
        match err.kind {
            ErrorKind::Unauthorized => self.unauthorized().await,
            ErrorKind::Application if !err.message.is_empty() => {
                self.alerts.error(err.message.clone());
            }
            _ => {
                warn!(error = %err, "Request failed");
                self.alerts.error(fallback);
            }
        }
        err
    }

    /// Session expired: forget it, clear cached data, stop polling and
    /// send the front-end to the login page.
    pub async fn unauthorized(&self) {
        warn!("Session rejected by device, returning to login");
        self.session.clear();
        self.client.set_session_id(None);
        self.snapshot.write().await.clear();
        self.teardown();
        self.emit(ViewEvent::Navigate(Route::Login));
    }

    // ── Polling ──────────────────────────────────────────────────

    /// Make `view` active: full refresh, then poll it.
    pub async fn open_view(self: &Arc<Self>, view: ViewKind) -> AppResult<()> {
        self.stop_polling();
        self.poll_state().view = Some(view);
        info!(view = ?view, "View opened");
        let result = self.full_refresh(view).await;
        if self.session.is_authenticated() {
            self.start_polling();
        }
        result
    }

    /// Suspend polling while hidden, resume when shown again.
    pub fn set_visible(self: &Arc<Self>, visible: bool) {
        self.poll_state().visible = visible;
        if visible {
            self.start_polling();
        } else {
            debug!("View hidden, polling suspended");
            self.stop_polling();
        }
    }

    /// Pause or resume auto-refresh. Returns the new setting.
    pub fn toggle_auto_refresh(self: &Arc<Self>) -> bool {
        let enabled = {
            let mut poll = self.poll_state();
            poll.auto_refresh = !poll.auto_refresh;
            poll.auto_refresh
        };
        if enabled {
            self.start_polling();
            self.alerts.info("Atualização automática ativada");
        } else {
            self.stop_polling();
            self.alerts.info("Atualização automática pausada");
        }
        enabled
    }

    /// Stop polling and forget the active view.
    pub fn teardown(&self) {
        self.stop_polling();
        self.poll_state().view = None;
    }

    fn start_polling(self: &Arc<Self>) {
        let mut poll = self.poll_state();
        if let Some(task) = poll.task.take() {
            task.abort();
        }
        let Some(view) = poll.view else {
            return;
        };
        if !poll.visible || !poll.auto_refresh {
            return;
        }

        let period = view.interval(&self.config);
        let this = Arc::clone(self);
        poll.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let _ = this.full_refresh(view).await;
            }
        }));
        debug!(view = ?view, period_secs = period.as_secs(), "Polling started");
    }

    fn stop_polling(&self) {
        if let Some(task) = self.poll_state().task.take() {
            task.abort();
        }
    }

    fn poll_state(&self) -> std::sync::MutexGuard<'_, PollState> {
        self.poll.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Realtime ─────────────────────────────────────────────────

    /// Apply one realtime push to the snapshot.
    pub async fn handle_push(&self, message: InboundMessage) {
        match message {
            InboundMessage::SystemStatus(partial) => {
                self.snapshot.write().await.merge_stats(partial);
                self.emit(ViewEvent::Rendered(Panel::Status));
            }
            InboundMessage::FullStatus(stats) => {
                self.snapshot.write().await.stats = stats;
                self.emit(ViewEvent::Rendered(Panel::Status));
            }
            InboundMessage::UserActivity(activity) => {
                let patched = self
                    .snapshot
                    .write()
                    .await
                    .patch_user(&activity.uid, &activity.changes);
                if patched {
                    self.emit(ViewEvent::Rendered(Panel::UserRow(activity.uid)));
                } else {
                    debug!(uid = %activity.uid, "Activity for a user not on screen");
                }
            }
            InboundMessage::CoffeeServed(served) => {
                self.alerts
                    .success(format!("Café servido para {}", served.user_name));
                if self.snapshot.write().await.record_coffee_served() {
                    self.emit(ViewEvent::Rendered(Panel::Status));
                }
            }
            InboundMessage::RfidEvent(event) => {
                let severity = if event.success {
                    Severity::Success
                } else {
                    Severity::Warning
                };
                self.alerts
                    .show(severity, format!("{}: {}", event.user_name, event.action));
            }
            InboundMessage::LogEntry(entry) => {
                self.snapshot.write().await.logs.push_front(entry);
                self.emit(ViewEvent::Rendered(Panel::Logs));
            }
            InboundMessage::Alert(alert) => {
                self.alerts
                    .show(Severity::from_str_value(&alert.severity), alert.message);
            }
            InboundMessage::NewRfidUid(scanned) => {
                self.snapshot.write().await.scanned_uid = Some(scanned.uid.clone());
                self.emit(ViewEvent::ScannedUid(scanned.uid));
            }
            InboundMessage::UserList(users) => {
                self.snapshot.write().await.users = users;
                self.emit(ViewEvent::Rendered(Panel::Users));
            }
            InboundMessage::Unknown { kind } => {
                debug!(kind = %kind, "Ignoring unrecognised realtime message");
            }
        }
    }

    /// Feed realtime pushes into [`handle_push`](Self::handle_push) until
    /// the channel closes.
    pub fn spawn_push_listener(self: &Arc<Self>, mut inbound: broadcast::Receiver<InboundMessage>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match inbound.recv().await {
                    Ok(message) => this.handle_push(message).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Realtime listener lagging, messages skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    pub(crate) fn emit(&self, event: ViewEvent) {
        let _ = self.events.send(event);
    }
}

type StatusAndUsers = (serde_json::Map<String, serde_json::Value>, Vec<cafeteira_core::types::User>);

#[cfg(test)]
mod tests {
    use super::*;
    use cafeteira_core::config::{AlertConfig, DeviceConfig};
    use cafeteira_core::session::Session;
    use cafeteira_realtime::message::{CoffeeServed, RfidEvent, UserActivity};
    use serde_json::json;

    fn coordinator() -> Arc<RefreshCoordinator> {
        // Nothing listens on port 9; pushes never reach the network.
        let client = DeviceClient::new(&DeviceConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..DeviceConfig::default()
        })
        .unwrap();
        let session = SessionStore::new();
        session.set(Session::new("admin", Role::Admin, 0));
        Arc::new(RefreshCoordinator::new(
            client,
            AlertSink::new(&AlertConfig::default()),
            session,
            RefreshConfig::default(),
        ))
    }

    #[test]
    fn test_intervals() {
        let config = RefreshConfig::default();
        assert_eq!(ViewKind::Status.interval(&config), Duration::from_secs(5));
        assert_eq!(ViewKind::Dashboard.interval(&config), Duration::from_secs(30));
        assert_eq!(ViewKind::Logs.interval(&config), Duration::from_secs(10));
        assert_eq!(Route::Login.path(), "/");
        assert_eq!(Route::Dashboard(Role::User).path(), "/user/dashboard");
    }

    #[tokio::test(start_paused = true)]
    async fn test_coffee_served_push_updates_counters() {
        let refresh = coordinator();
        refresh.snapshot.write().await.stats =
            json!({"coffee": {"remaining": 2, "totalServed": 5}}).as_object().cloned().unwrap();
        let mut events = refresh.subscribe();

        refresh
            .handle_push(InboundMessage::CoffeeServed(CoffeeServed {
                user_name: "Ana".into(),
                uid: None,
            }))
            .await;

        let alerts = refresh.alerts.active();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Success);
        assert_eq!(alerts[0].message, "Café servido para Ana");
        let summary = refresh.snapshot().await.summary();
        assert_eq!((summary.remaining, summary.total_served), (1, 6));
        assert_eq!(events.recv().await.unwrap(), ViewEvent::Rendered(Panel::Status));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rfid_event_severity() {
        let refresh = coordinator();
        refresh
            .handle_push(InboundMessage::RfidEvent(RfidEvent {
                user_name: "Joana".into(),
                action: "Sem créditos".into(),
                success: false,
            }))
            .await;
        let alert = &refresh.alerts.active()[0];
        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.message, "Joana: Sem créditos");
    }

    #[tokio::test(start_paused = true)]
    async fn test_targeted_user_row_update() {
        let refresh = coordinator();
        refresh.snapshot.write().await.users =
            serde_json::from_value(json!([{"uid": "AB12", "name": "Joana", "credits": 3}])).unwrap();
        let mut events = refresh.subscribe();

        refresh
            .handle_push(InboundMessage::UserActivity(UserActivity {
                uid: "AB12".into(),
                changes: json!({"credits": 2}).as_object().cloned().unwrap(),
            }))
            .await;

        assert_eq!(refresh.snapshot().await.users[0].credits, 2);
        assert_eq!(
            events.recv().await.unwrap(),
            ViewEvent::Rendered(Panel::UserRow("AB12".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_log_push_and_unknown_kind() {
        let refresh = coordinator();
        refresh
            .handle_push(InboundMessage::LogEntry(LogEntry::from("[INFO] Café servido")))
            .await;
        refresh
            .handle_push(InboundMessage::Unknown {
                kind: "firmware_update".into(),
            })
            .await;

        let snapshot = refresh.snapshot().await;
        assert_eq!(snapshot.logs.len(), 1);
        assert!(refresh.alerts.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_auto_refresh_announces_state() {
        let refresh = coordinator();
        assert!(refresh.auto_refresh_enabled());

        assert!(!refresh.toggle_auto_refresh());
        assert!(refresh.toggle_auto_refresh());

        let messages: Vec<_> = refresh.alerts.active().into_iter().map(|a| a.message).collect();
        assert_eq!(
            messages,
            vec!["Atualização automática pausada", "Atualização automática ativada"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_view_does_not_poll() {
        let refresh = coordinator();
        refresh.poll_state().view = Some(ViewKind::Dashboard);

        refresh.set_visible(false);
        assert!(!refresh.is_polling());
        refresh.set_visible(true);
        assert!(refresh.is_polling());
        refresh.teardown();
        assert!(!refresh.is_polling());
    }
}
