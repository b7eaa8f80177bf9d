//! Session commands.

use clap::Args;
use serde::Serialize;

use cafeteira_client::DeviceClient;
use cafeteira_core::error::AppError;

use crate::output::{self, OutputFormat};

/// Arguments for `login`
#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Username
    pub username: String,
    /// Password (will prompt if not provided)
    #[arg(short, long)]
    pub password: Option<String>,
}

/// Session details for JSON output
#[derive(Debug, Serialize)]
struct SessionInfo {
    username: String,
    role: String,
    session_time_ms: u64,
}

/// Log in and print the session id to reuse with `--session`.
pub async fn login(client: &DeviceClient, args: &LoginArgs) -> Result<(), AppError> {
    let password = match &args.password {
        Some(p) => p.clone(),
        None => dialoguer::Password::new()
            .with_prompt("Senha")
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?,
    };

    let response = client.login(&args.username, &password).await?;
    output::print_success(&format!("Logged in as '{}'", args.username));
    if let Some(role) = &response.role {
        output::print_kv("Role", role);
    }
    match client.session_id() {
        Some(session_id) => {
            output::print_kv("Session", &session_id);
            println!("\nReuse it with: cafeteira --session {session_id} <command>");
        }
        None => output::print_warning("The device did not return a session id"),
    }
    Ok(())
}

/// Show who the current session belongs to.
pub async fn whoami(client: &DeviceClient, format: OutputFormat) -> Result<(), AppError> {
    let session = client
        .check_auth()
        .await?
        .into_session()
        .ok_or_else(|| AppError::unauthorized("Autenticação necessária"))?;

    match format {
        OutputFormat::Table => {
            output::print_kv("Username", &session.username);
            output::print_kv("Role", session.role.as_str());
            output::print_kv("Dashboard", session.role.dashboard_route());
            output::print_kv("Session age", &format!("{}s", session.session_time_ms / 1000));
        }
        OutputFormat::Json => output::print_json(&SessionInfo {
            username: session.username,
            role: session.role.as_str().to_string(),
            session_time_ms: session.session_time_ms,
        }),
    }
    Ok(())
}

/// End the session on the device.
pub async fn logout(client: &DeviceClient) -> Result<(), AppError> {
    client.logout().await?;
    output::print_success("Logged out");
    Ok(())
}
