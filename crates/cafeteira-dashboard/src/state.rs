//! Application state shared by the front-ends.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use cafeteira_client::DeviceClient;
use cafeteira_core::config::AppConfig;
use cafeteira_core::error::{AppError, ErrorKind};
use cafeteira_core::session::{Role, Session, SessionStore};
use cafeteira_core::AppResult;
use cafeteira_realtime::{ConnectionEvent, ConnectionManager, Connector, OutboundMessage, WsConnector};

use crate::actions::AdminActions;
use crate::alerts::AlertSink;
use crate::refresh::{RefreshCoordinator, Route, ViewEvent, ViewKind};

/// Application state containing every shared service.
///
/// All fields are `Arc`-backed for cheap cloning across tasks.
#[derive(Debug, Clone)]
pub struct AppState {
    // ── Configuration ────────────────────────────────────────
    /// Application configuration
    pub config: Arc<AppConfig>,

    // ── Device access ────────────────────────────────────────
    /// REST client
    pub client: DeviceClient,
    /// Current session
    pub session: SessionStore,
    /// Realtime connection, when enabled
    pub realtime: Option<Arc<ConnectionManager>>,

    // ── Presentation ─────────────────────────────────────────
    /// Alert sink
    pub alerts: AlertSink,
    /// View refresh coordinator
    pub refresh: Arc<RefreshCoordinator>,
    /// Admin commands
    pub actions: AdminActions,

    /// Listener tasks started by [`start`](Self::start)
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl AppState {
    /// Build the state for a real device.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let client = DeviceClient::new(&config.device)?;
        let connector = Arc::new(WsConnector::new(client.clone(), config.realtime.path.clone()));
        Ok(Self::with_connector(config, client, connector))
    }

    /// Build the state around an existing client and socket connector.
    pub fn with_connector(config: AppConfig, client: DeviceClient, connector: Arc<dyn Connector>) -> Self {
        let session = SessionStore::new();
        let alerts = AlertSink::new(&config.alerts);
        let refresh = Arc::new(RefreshCoordinator::new(
            client.clone(),
            alerts.clone(),
            session.clone(),
            config.refresh.clone(),
        ));
        let actions = AdminActions::new(client.clone(), alerts.clone(), Arc::clone(&refresh));
        let realtime = config
            .realtime
            .enabled
            .then(|| Arc::new(ConnectionManager::spawn(connector, session.clone(), &config.realtime)));

        Self {
            config: Arc::new(config),
            client,
            session,
            realtime,
            alerts,
            refresh,
            actions,
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    // ── Session ──────────────────────────────────────────────────

    /// Ask the device whether the stored cookie is still valid and install
    /// the session. Sends the front-end to the login page when it is not.
    pub async fn authenticate(&self) -> AppResult<Session> {
        let check = match self.client.check_auth().await {
            Ok(check) => check,
            Err(e) if e.kind == ErrorKind::Unauthorized => {
                self.refresh.unauthorized().await;
                return Err(e);
            }
            Err(e) => {
                warn!(error = %e, "Auth check failed");
                self.refresh.emit(ViewEvent::Navigate(Route::Login));
                return Err(e);
            }
        };

        match check.into_session() {
            Some(session) => {
                info!(username = %session.username, role = session.role.as_str(), "Session established");
                self.session.set(session.clone());
                Ok(session)
            }
            None => {
                self.refresh.unauthorized().await;
                Err(AppError::unauthorized("Sessão expirada"))
            }
        }
    }

    /// Log in with credentials, then establish the session.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<Session> {
        if let Err(e) = self.client.login(username, password).await {
            self.alerts.error(e.message.clone());
            return Err(e);
        }
        self.authenticate().await
    }

    /// End the session on the device and tear everything down.
    pub async fn logout(&self) -> AppResult<()> {
        match self.client.logout().await {
            Ok(()) => {
                self.session.clear();
                self.teardown().await;
                self.refresh.emit(ViewEvent::Navigate(Route::Login));
                Ok(())
            }
            Err(e) => {
                let text = match e.kind {
                    ErrorKind::Network => "Erro de conexão no logout",
                    _ => "Erro ao fazer logout",
                };
                self.alerts.error(text);
                Err(e)
            }
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open `view` for the current session: connect the realtime socket,
    /// route pushes into the coordinator, then refresh and poll the view.
    ///
    /// Non-admins asking for an admin view are sent to their own dashboard.
    pub async fn start(&self, view: ViewKind) -> AppResult<()> {
        let Some(session) = self.session.current() else {
            self.refresh.emit(ViewEvent::Navigate(Route::Login));
            return Err(AppError::unauthorized("Autenticação necessária"));
        };
        if view.requires_admin() && !session.is_admin() {
            self.alerts.error("Acesso negado - apenas administradores");
            self.refresh.emit(ViewEvent::Navigate(Route::Dashboard(Role::User)));
            return Err(AppError::unauthorized("Acesso negado - apenas administradores"));
        }

        self.abort_tasks();
        let session_watch = self.spawn_session_watch();
        self.tasks_guard().push(session_watch);
        if let Some(realtime) = &self.realtime {
            let listener = self.refresh.spawn_push_listener(realtime.subscribe());
            let watcher = spawn_connection_alerts(realtime.events(), self.alerts.clone());
            self.tasks_guard().extend([listener, watcher]);
            realtime.connect();
        }

        if let Err(e) = self.refresh.open_view(view).await {
            warn!(view = ?view, error = %e, "Initial refresh failed");
        }
        Ok(())
    }

    /// Ask the device to push fresh status and users over the socket.
    /// Returns `false` when the socket is not open.
    pub fn request_sync(&self) -> bool {
        let Some(realtime) = &self.realtime else {
            return false;
        };
        realtime.send(&OutboundMessage::GetStatus) && realtime.send(&OutboundMessage::GetUsers)
    }

    /// Stop polling, close the socket, abort listeners and clear alerts.
    pub async fn teardown(&self) {
        self.refresh.teardown();
        if let Some(realtime) = &self.realtime {
            realtime.disconnect();
        }
        self.abort_tasks();
        self.alerts.clear();
        info!("Dashboard torn down");
    }

    /// Tear down and stop the connection task.
    pub async fn shutdown(&self) {
        self.teardown().await;
        if let Some(realtime) = &self.realtime {
            realtime.shutdown().await;
        }
    }

    /// Tear everything down once the session ends, whoever ended it: a 401
    /// seen by the refresh coordinator, a logout, or an expired check.
    fn spawn_session_watch(&self) -> JoinHandle<()> {
        let state = self.clone();
        let mut session = self.session.subscribe();
        session.borrow_and_update();
        tokio::spawn(async move {
            while session.changed().await.is_ok() {
                if session.borrow_and_update().is_none() {
                    info!("Session ended, tearing down dashboard");
                    state.teardown().await;
                    break;
                }
            }
        })
    }

    fn abort_tasks(&self) {
        for task in self.tasks_guard().drain(..) {
            task.abort();
        }
    }

    fn tasks_guard(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Turn connection lifecycle events into alerts.
///
/// Opening announces success; losing an open socket warns that a reconnect
/// is pending; failing to open at all is reported as an error.
fn spawn_connection_alerts(mut events: broadcast::Receiver<ConnectionEvent>, alerts: AlertSink) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(ConnectionEvent::Opened) => {
                    alerts.success("Conectado ao sistema em tempo real");
                }
                Ok(ConnectionEvent::Lost) => {
                    alerts.warning("Conexão perdida. Tentando reconectar...");
                }
                Ok(ConnectionEvent::OpenFailed) => {
                    alerts.error("Erro na conexão em tempo real");
                }
                Ok(ConnectionEvent::Closed) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Connection events skipped"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use cafeteira_core::config::DeviceConfig;
    use cafeteira_realtime::{ConnectionState, Transport};

    use crate::alerts::Severity;

    struct RefusingConnector {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Connector for RefusingConnector {
        async fn connect(&self) -> AppResult<Transport> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(AppError::transport("connection refused"))
        }
    }

    fn state() -> (AppState, Arc<RefusingConnector>) {
        let mut config = AppConfig::default();
        // Nothing listens on port 9.
        config.device = DeviceConfig {
            base_url: "http://127.0.0.1:9".into(),
            ..DeviceConfig::default()
        };
        let client = DeviceClient::new(&config.device).unwrap();
        let connector = Arc::new(RefusingConnector {
            attempts: AtomicUsize::new(0),
        });
        (AppState::with_connector(config, client, connector.clone()), connector)
    }

    #[tokio::test]
    async fn test_user_cannot_open_admin_view() {
        let (state, connector) = state();
        state.session.set(Session::new("joana", Role::User, 0));
        let mut events = state.refresh.subscribe();

        let err = state.start(ViewKind::Dashboard).await.unwrap_err();

        assert_eq!(err.kind, ErrorKind::Unauthorized);
        assert_eq!(
            events.recv().await.unwrap(),
            ViewEvent::Navigate(Route::Dashboard(Role::User))
        );
        assert_eq!(state.alerts.active()[0].message, "Acesso negado - apenas administradores");
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 0);
        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_without_session_goes_to_login() {
        let (state, _) = state();
        let mut events = state.refresh.subscribe();

        assert!(state.start(ViewKind::Status).await.is_err());
        assert_eq!(events.recv().await.unwrap(), ViewEvent::Navigate(Route::Login));
        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_socket_open_raises_error_alert() {
        let (state, connector) = state();
        state.session.set(Session::new("admin", Role::Admin, 0));

        let mut connection = state.realtime.as_ref().unwrap().watch_state();
        state.start(ViewKind::Status).await.unwrap();
        connection
            .wait_for(|s| *s == ConnectionState::Reconnecting)
            .await
            .unwrap();
        let raised = async {
            while !state.alerts.active().iter().any(|a| {
                a.severity == Severity::Error && a.message == "Erro na conexão em tempo real"
            }) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(2), raised).await.unwrap();

        assert!(connector.attempts.load(Ordering::SeqCst) >= 1);
        assert!(!state.request_sync());
        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_teardown_stops_polling_and_clears_alerts() {
        let (state, _) = state();
        state.session.set(Session::new("admin", Role::Admin, 0));
        state.start(ViewKind::Status).await.unwrap();
        assert!(state.refresh.is_polling());

        state.teardown().await;

        assert!(!state.refresh.is_polling());
        assert!(state.alerts.is_empty());
        state
            .realtime
            .as_ref()
            .unwrap()
            .watch_state()
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await
            .unwrap();
        state.shutdown().await;
    }

    #[tokio::test]
    async fn test_rejected_session_tears_down_listeners() {
        let (state, _) = state();
        state.session.set(Session::new("admin", Role::Admin, 0));
        state.start(ViewKind::Status).await.unwrap();
        assert!(!state.tasks_guard().is_empty());

        state.refresh.unauthorized().await;

        let torn_down = async {
            while !state.tasks_guard().iter().all(|t| t.is_finished()) || !state.alerts.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(2), torn_down).await.unwrap();
        assert!(!state.refresh.is_polling());
        state
            .realtime
            .as_ref()
            .unwrap()
            .watch_state()
            .wait_for(|s| *s == ConnectionState::Disconnected)
            .await
            .unwrap();
        state.shutdown().await;
    }
}
