//! CLI command definitions and dispatch.

pub mod backup;
pub mod device;
pub mod logs;
pub mod session;
pub mod user;
pub mod watch;

use clap::{Parser, Subcommand};

use cafeteira_client::DeviceClient;
use cafeteira_core::config::AppConfig;
use cafeteira_core::error::AppError;

use crate::output::OutputFormat;

/// Cafeteira: RFID coffee dispenser administration
#[derive(Debug, Parser)]
#[command(name = "cafeteira", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Configuration overlay (`config/<env>.toml`)
    #[arg(long, default_value = "development")]
    pub env: String,

    /// Device base URL, overriding the configuration
    #[arg(long)]
    pub device: Option<String>,

    /// Session id, overriding the configuration
    #[arg(short, long)]
    pub session: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in and print the session id
    Login(session::LoginArgs),
    /// Show the current session
    Whoami,
    /// End the current session
    Logout,
    /// Show device status
    Status,
    /// Show usage statistics
    Stats,
    /// Dispense one coffee
    Serve,
    /// Refill the bottle
    Refill(device::ConfirmArgs),
    /// Restart the device
    Reset(device::ConfirmArgs),
    /// Delete every user and counter
    ClearData(device::ClearDataArgs),
    /// User management
    Users(user::UserArgs),
    /// Device logs
    Logs(logs::LogsArgs),
    /// Write a backup file
    Backup(backup::BackupArgs),
    /// Restore a backup file
    Restore(backup::RestoreArgs),
    /// Print realtime events until interrupted
    Watch,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        let config = self.load_config()?;
        let client = DeviceClient::new(&config.device)?;

        match &self.command {
            Commands::Login(args) => session::login(&client, args).await,
            Commands::Whoami => session::whoami(&client, self.format).await,
            Commands::Logout => session::logout(&client).await,
            Commands::Status => device::status(&client, self.format).await,
            Commands::Stats => device::stats(&client).await,
            Commands::Serve => device::serve(&client).await,
            Commands::Refill(args) => device::refill(&client, args).await,
            Commands::Reset(args) => device::reset(&client, args).await,
            Commands::ClearData(args) => device::clear_data(&client, args).await,
            Commands::Users(args) => user::execute(args, &client, self.format).await,
            Commands::Logs(args) => logs::execute(args, &client, self.format).await,
            Commands::Backup(args) => backup::backup(&client, args).await,
            Commands::Restore(args) => backup::restore(&client, args).await,
            Commands::Watch => watch::execute(&client, &config).await,
        }
    }

    /// Load configuration and apply command-line overrides.
    fn load_config(&self) -> Result<AppConfig, AppError> {
        let mut config = AppConfig::load(&self.config, &self.env)?;
        if let Some(device) = &self.device {
            config.device.base_url = device.clone();
        }
        if let Some(session) = &self.session {
            config.device.session_id = Some(session.clone());
        }
        Ok(config)
    }
}

/// Ask for a yes/no confirmation unless `assume_yes` is set.
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool, AppError> {
    if assume_yes {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| AppError::internal(format!("Input error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::try_parse_from([
            "cafeteira",
            "--device",
            "http://192.168.4.1",
            "--session",
            "abc",
            "--format",
            "json",
            "users",
            "add",
            "AB12",
            "Joana",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        let config = cli.load_config().unwrap();
        assert_eq!(config.device.base_url, "http://192.168.4.1");
        assert_eq!(config.device.session_id.as_deref(), Some("abc"));
        assert!(matches!(cli.command, Commands::Users(_)));
    }
}
