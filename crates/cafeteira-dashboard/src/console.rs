//! Live terminal front-end.
//!
//! Redraws the active view on every panel change, alert change and
//! connection transition, and reads one command per line from stdin.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Local};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use cafeteira_client::BackupFormat;
use cafeteira_core::session::Session;
use cafeteira_core::error::ErrorKind;
use cafeteira_core::{AppError, AppResult};
use cafeteira_realtime::ConnectionState;

use crate::alerts::Alert;
use crate::refresh::{Route, ViewEvent, ViewKind};
use crate::render::{self, NO_ACTIVE_USERS, NO_ACTIVITY, NO_LOGS};
use crate::snapshot::DashboardSnapshot;
use crate::state::AppState;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// A line typed at the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Dispense a coffee.
    Serve,
    /// Refill the bottle.
    Refill,
    /// Reboot the device.
    Reset,
    /// Refresh the view now.
    Refresh,
    /// Pause or resume auto-refresh.
    Pause,
    /// Suspend polling as if the page were hidden.
    Hide,
    /// Resume polling after `hide`.
    Show,
    /// Ask the device to push status and users over the socket.
    Sync,
    /// Switch view.
    Open(ViewKind),
    /// Register a card.
    Add {
        /// Card UID.
        uid: String,
        /// Display name.
        name: String,
    },
    /// Remove a card.
    Remove(String),
    /// Look up a card.
    Lookup(String),
    /// Delete the device logs.
    ClearLogs,
    /// Wipe all data; the argument is the typed confirmation.
    ClearAll(String),
    /// Write a backup into the current directory.
    Backup(BackupFormat),
    /// Dismiss every alert.
    Dismiss,
    /// End the session.
    Logout,
    /// Leave the console.
    Quit,
    /// Show the command list.
    Help,
}

impl FromStr for ConsoleCommand {
    type Err = AppError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        let command = match word.to_lowercase().as_str() {
            "serve" | "s" => Self::Serve,
            "refill" => Self::Refill,
            "reset" => Self::Reset,
            "refresh" | "r" => Self::Refresh,
            "pause" | "p" => Self::Pause,
            "hide" => Self::Hide,
            "show" => Self::Show,
            "sync" => Self::Sync,
            "status" => Self::Open(ViewKind::Status),
            "dashboard" => Self::Open(ViewKind::Dashboard),
            "logs" => Self::Open(ViewKind::Logs),
            "add" => {
                let (uid, name) = rest.split_once(' ').unwrap_or((rest, ""));
                Self::Add {
                    uid: uid.to_string(),
                    name: name.trim().to_string(),
                }
            }
            "remove" | "rm" => Self::Remove(rest.to_string()),
            "lookup" => Self::Lookup(rest.to_string()),
            "clear-logs" => Self::ClearLogs,
            "clear-all" => Self::ClearAll(rest.to_string()),
            "backup" => match rest {
                "" | "txt" | "text" => Self::Backup(BackupFormat::Text),
                "json" => Self::Backup(BackupFormat::Json),
                other => {
                    return Err(AppError::validation(format!("Formato de backup desconhecido: {other}")));
                }
            },
            "dismiss" => Self::Dismiss,
            "logout" => Self::Logout,
            "quit" | "exit" | "q" => Self::Quit,
            "help" | "?" => Self::Help,
            other => return Err(AppError::validation(format!("Comando desconhecido: {other}"))),
        };
        Ok(command)
    }
}

/// Command reference shown by `help`.
pub const HELP: &str = "\
Comandos:
  serve | refill | reset             controles da cafeteira
  refresh | pause | hide | show      atualização dos dados
  sync                               pedir status pelo canal em tempo real
  status | dashboard | logs          trocar de tela
  add <uid> <nome> | remove <uid> | lookup <uid>
  clear-logs | clear-all LIMPAR TUDO
  backup [txt|json] | dismiss | logout | quit";

/// What the loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

/// Everything drawn on one screen.
#[derive(Debug, Clone)]
pub struct Screen<'a> {
    /// Active view.
    pub view: ViewKind,
    /// Logged-in operator.
    pub session: Option<&'a Session>,
    /// Realtime socket state, if enabled.
    pub connection: Option<ConnectionState>,
    /// Auto-refresh setting.
    pub auto_refresh: bool,
    /// Cached data.
    pub snapshot: &'a DashboardSnapshot,
    /// Visible alerts, oldest first.
    pub alerts: &'a [Alert],
    /// Wall clock used for relative times.
    pub now: DateTime<Local>,
}

impl Screen<'_> {
    /// Render to plain text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let title = match self.view {
            ViewKind::Status => "Cafeteira RFID",
            ViewKind::Dashboard => "Dashboard Administrativo",
            ViewKind::Logs => "Logs do Sistema",
        };
        let _ = write!(out, "☕ {title}");
        if let Some(session) = self.session {
            let _ = write!(out, "   [{}] {} ({})", session.avatar(), session.username, session.role.as_str());
        }
        out.push('\n');

        let connection = self
            .connection
            .map(|c| c.as_str())
            .unwrap_or("desativado");
        let refresh = if self.auto_refresh { "automática" } else { "pausada" };
        let refreshed = self
            .snapshot
            .refreshed_at
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "--:--:--".to_string());
        let _ = writeln!(
            out,
            "Tempo real: {connection}   Atualização: {refresh}   Última atualização: {refreshed}\n"
        );

        for alert in self.alerts {
            let _ = writeln!(out, "{alert}");
        }
        if !self.alerts.is_empty() {
            out.push('\n');
        }

        let summary = self.snapshot.summary();
        match self.view {
            ViewKind::Status => {
                let _ = writeln!(out, "{}", render::legacy_status_view(&summary));
                let _ = writeln!(out, "{}", render::user_list(&self.snapshot.users));
                if let Some(uid) = &self.snapshot.scanned_uid {
                    let _ = writeln!(out, "Cartão lido: {uid}");
                }
            }
            ViewKind::Dashboard => {
                let _ = writeln!(out, "{}", render::status_view(&summary));
                let _ = writeln!(out, "Usuários ativos hoje:");
                let active = render::active_users(&self.snapshot.users, self.now);
                if active.is_empty() {
                    let _ = writeln!(out, "  {NO_ACTIVE_USERS}");
                }
                for card in active {
                    let _ = writeln!(out, "  ({}) {} - {}", card.avatar, card.name, card.credits);
                }
                let _ = writeln!(out, "\nAtividade recente:");
                self.write_logs(&mut out, NO_ACTIVITY);
                let _ = writeln!(out, "\n{}", render::user_list(&self.snapshot.users));
                if let Some(uid) = &self.snapshot.scanned_uid {
                    let _ = writeln!(out, "Novo cartão lido: {uid}");
                }
            }
            ViewKind::Logs => self.write_logs(&mut out, NO_LOGS),
        }
        out
    }

    fn write_logs(&self, out: &mut String, empty: &str) {
        let lines = render::log_lines(self.snapshot.logs.iter(), self.now);
        if lines.is_empty() {
            let _ = writeln!(out, "  {empty}");
        }
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
    }
}

/// Interactive console bound to an [`AppState`].
#[derive(Debug)]
pub struct Console {
    state: AppState,
    view: ViewKind,
    backup_dir: PathBuf,
}

impl Console {
    /// Create a console that starts on `view`.
    pub fn new(state: AppState, view: ViewKind) -> Self {
        Self {
            state,
            view,
            backup_dir: PathBuf::from("."),
        }
    }

    /// Directory backups are written to.
    pub fn with_backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = dir.into();
        self
    }

    /// Run until `quit`, logout, a 401, stdin closing, or `shutdown`.
    pub async fn run(mut self, shutdown: CancellationToken) -> AppResult<()> {
        let mut view_events = self.state.refresh.subscribe();
        let mut alert_events = self.state.alerts.subscribe();
        let mut connection = self.state.realtime.as_ref().map(|r| r.watch_state());
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        self.open_initial_view().await?;
        self.draw().await?;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = view_events.recv() => match event {
                    Ok(ViewEvent::Navigate(Route::Login)) => {
                        info!("Session ended, leaving console");
                        break;
                    }
                    Ok(ViewEvent::Navigate(Route::Dashboard(role))) => {
                        debug!(role = role.as_str(), "Redirected to role dashboard");
                        if self.view != ViewKind::Status {
                            self.view = ViewKind::Status;
                            self.state.start(self.view).await?;
                        }
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => break,
                },
                event = alert_events.recv() => {
                    if matches!(event, Err(RecvError::Closed)) {
                        break;
                    }
                }
                changed = async {
                    match connection.as_mut() {
                        Some(rx) => rx.changed().await.is_ok(),
                        None => std::future::pending().await,
                    }
                } => {
                    if !changed {
                        connection = None;
                    }
                }
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<ConsoleCommand>() {
                        Ok(command) => {
                            if self.execute(command).await == Flow::Exit {
                                break;
                            }
                        }
                        Err(e) => {
                            self.state.alerts.warning(e.message);
                        }
                    }
                }
            }
            self.draw().await?;
        }

        self.state.teardown().await;
        Ok(())
    }

    /// Start the requested view. A session that may not open it lands on
    /// the status view instead.
    async fn open_initial_view(&mut self) -> AppResult<()> {
        match self.state.start(self.view).await {
            Err(e) if e.kind == ErrorKind::Unauthorized && self.state.session.is_authenticated() => {
                debug!(view = ?self.view, "View denied, opening status view");
                self.view = ViewKind::Status;
                self.state.start(self.view).await
            }
            result => result,
        }
    }

    async fn execute(&mut self, command: ConsoleCommand) -> Flow {
        let state = &self.state;
        debug!(command = ?command, "Console command");
        // Failures are already reported to the alert sink.
        match command {
            ConsoleCommand::Serve => {
                let _ = state.actions.serve_coffee().await;
            }
            ConsoleCommand::Refill => {
                let _ = state.actions.refill_coffee().await;
            }
            ConsoleCommand::Reset => {
                let _ = state.actions.system_reset().await;
            }
            ConsoleCommand::Refresh => {
                let _ = state.refresh.refresh_now().await;
            }
            ConsoleCommand::Pause => {
                state.refresh.toggle_auto_refresh();
            }
            ConsoleCommand::Hide => state.refresh.set_visible(false),
            ConsoleCommand::Show => state.refresh.set_visible(true),
            ConsoleCommand::Sync => {
                if !state.request_sync() {
                    state.alerts.warning("Canal em tempo real indisponível");
                }
            }
            ConsoleCommand::Open(view) => {
                if state.start(view).await.is_ok() {
                    self.view = view;
                }
            }
            ConsoleCommand::Add { uid, name } => {
                let _ = state.actions.add_user(&uid, &name).await;
            }
            ConsoleCommand::Remove(uid) => {
                let _ = state.actions.remove_user(&uid).await;
            }
            ConsoleCommand::Lookup(uid) => {
                if let Ok(lookup) = state.actions.lookup_user(&uid).await {
                    if lookup.success {
                        state.alerts.info(format!(
                            "{}: {} ({} créditos)",
                            lookup.uid.unwrap_or(uid),
                            lookup.name.unwrap_or_default(),
                            lookup.credits.unwrap_or(0)
                        ));
                    }
                }
            }
            ConsoleCommand::ClearLogs => {
                let _ = state.actions.clear_logs().await;
            }
            ConsoleCommand::ClearAll(confirmation) => {
                let _ = state.actions.clear_all_data(&confirmation).await;
            }
            ConsoleCommand::Backup(format) => {
                let _ = state.actions.export_backup(&self.backup_dir, format).await;
            }
            ConsoleCommand::Dismiss => state.alerts.clear(),
            ConsoleCommand::Logout => {
                if state.logout().await.is_ok() {
                    return Flow::Exit;
                }
            }
            ConsoleCommand::Quit => return Flow::Exit,
            ConsoleCommand::Help => {
                state.alerts.show_sticky(crate::alerts::Severity::Info, HELP);
            }
        }
        Flow::Continue
    }

    async fn draw(&self) -> AppResult<()> {
        let snapshot = self.state.refresh.snapshot().await;
        let session = self.state.session.current();
        let alerts = self.state.alerts.active();
        let screen = Screen {
            view: self.view,
            session: session.as_ref(),
            connection: self.state.realtime.as_ref().map(|r| r.state()),
            auto_refresh: self.state.refresh.auto_refresh_enabled(),
            snapshot: &snapshot,
            alerts: &alerts,
            now: Local::now(),
        };

        let mut stdout = tokio::io::stdout();
        stdout.write_all(CLEAR_SCREEN.as_bytes()).await?;
        stdout.write_all(screen.render().as_bytes()).await?;
        stdout.write_all(b"\n> ").await?;
        stdout.flush().await?;
        Ok(())
    }
}
