//! Cafeteira Monitor: live terminal dashboard for an RFID coffee device
//!
//! Main entry point that wires the crates together and runs the console.

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

use cafeteira_core::config::AppConfig;
use cafeteira_core::error::AppError;
use cafeteira_core::session::Role;
use cafeteira_dashboard::console::Console;
use cafeteira_dashboard::{AppState, ViewKind};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Monitor error: {}", e);
        eprintln!("{}", e.message);
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path =
        std::env::var("CAFETEIRA_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

    let env = std::env::var("CAFETEIRA_ENV").unwrap_or_else(|_| "development".to_string());

    AppConfig::load(&config_path, &env)
}

/// Initialize tracing/logging. Output goes to stderr so it does not
/// interleave with the dashboard on stdout.
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

/// View named on the command line, if any.
fn requested_view() -> Result<Option<ViewKind>, AppError> {
    match std::env::args().nth(1).as_deref() {
        None => Ok(None),
        Some("status") => Ok(Some(ViewKind::Status)),
        Some("dashboard") => Ok(Some(ViewKind::Dashboard)),
        Some("logs") => Ok(Some(ViewKind::Logs)),
        Some(other) => Err(AppError::validation(format!(
            "Unknown view '{other}' (expected status, dashboard or logs)"
        ))),
    }
}

/// Main monitor run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(
        device = %config.device.base_url,
        dialect = ?config.device.dialect,
        "Starting Cafeteira Monitor v{}",
        env!("CARGO_PKG_VERSION")
    );

    let requested = requested_view()?;
    let credentials = match (&config.device.session_id, &config.device.username, &config.device.password) {
        (None, Some(username), Some(password)) => Some((username.clone(), password.clone())),
        _ => None,
    };

    let state = AppState::new(config)?;

    // ── Step 1: Establish the session ────────────────────────────
    let session = match credentials {
        Some((username, password)) => state.login(&username, &password).await?,
        None => state.authenticate().await?,
    };
    tracing::info!(username = %session.username, role = session.role.as_str(), "Authenticated");

    // ── Step 2: Pick the view ────────────────────────────────────
    let view = requested.unwrap_or(match session.role {
        Role::Admin => ViewKind::Dashboard,
        Role::User => ViewKind::Status,
    });

    // ── Step 3: Run the console until Ctrl-C ─────────────────────
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal.cancel();
        }
    });

    let result = Console::new(state.clone(), view).run(shutdown).await;

    // ── Step 4: Graceful shutdown ────────────────────────────────
    state.shutdown().await;
    tracing::info!("Cafeteira Monitor stopped");
    result
}
