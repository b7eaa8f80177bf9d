//! Device log commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use cafeteira_client::DeviceClient;
use cafeteira_core::error::AppError;
use cafeteira_core::types::LogEntry;

use crate::output::{self, OutputFormat};

/// Arguments for log commands
#[derive(Debug, Args)]
pub struct LogsArgs {
    /// Log subcommand
    #[command(subcommand)]
    pub command: LogsCommand,
}

/// Log subcommands
#[derive(Debug, Subcommand)]
pub enum LogsCommand {
    /// List recent log entries
    List {
        /// Maximum number of entries
        #[arg(short, long, default_value_t = 50)]
        limit: u32,
    },
    /// Delete all device logs
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Log display row for table output
#[derive(Debug, Serialize, Tabled)]
struct LogRow {
    /// Local time
    #[tabled(rename = "Hora")]
    time: String,
    /// Level
    #[tabled(rename = "Nível")]
    level: String,
    /// Message
    #[tabled(rename = "Mensagem")]
    message: String,
}

impl From<&LogEntry> for LogRow {
    fn from(entry: &LogEntry) -> Self {
        Self {
            time: entry
                .timestamp()
                .map(|t| t.format("%d/%m %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string()),
            level: entry.level().as_str().to_uppercase(),
            message: match entry.details() {
                Some(details) => format!("{} ({details})", entry.message()),
                None => entry.message().to_string(),
            },
        }
    }
}

/// Execute log commands
pub async fn execute(args: &LogsArgs, client: &DeviceClient, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        LogsCommand::List { limit } => {
            let entries = client.logs(Some(*limit)).await?;
            match format {
                OutputFormat::Table => {
                    let rows: Vec<LogRow> = entries.iter().map(LogRow::from).collect();
                    output::print_list(&rows, format, "Nenhum log encontrado");
                }
                OutputFormat::Json => output::print_json(&entries),
            }
        }
        LogsCommand::Clear { yes } => {
            if !super::confirm("Isso irá apagar todos os logs do sistema. Confirmar?", *yes)? {
                output::print_warning("Operação cancelada.");
                return Ok(());
            }
            let response = client.clear_logs().await?;
            if !response.success {
                return Err(AppError::application("Erro ao limpar logs"));
            }
            output::print_success("Logs limpos com sucesso!");
        }
    }

    Ok(())
}
