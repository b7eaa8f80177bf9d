//! Backup and restore commands.

use std::path::PathBuf;

use chrono::Local;
use clap::{Args, ValueEnum};
use serde_json::Value;

use cafeteira_client::backup::{parse_text, users_in};
use cafeteira_client::{BackupArtifact, BackupFormat, DeviceClient};
use cafeteira_core::error::AppError;

use crate::output;

/// Backup file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    /// `ADD <uid> <name>` lines
    Txt,
    /// Pretty-printed JSON payload
    Json,
}

impl From<FormatArg> for BackupFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Txt => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Arguments for `backup`
#[derive(Debug, Args)]
pub struct BackupArgs {
    /// File format
    #[arg(long = "as", value_enum, default_value = "txt")]
    pub format: FormatArg,
    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,
}

/// Arguments for `restore`
#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Backup file (`.txt` or `.json`)
    pub path: PathBuf,
}

/// Fetch the backup payload and write it to disk.
pub async fn backup(client: &DeviceClient, args: &BackupArgs) -> Result<(), AppError> {
    let payload = client.backup().await?;
    let artifact = BackupArtifact::from_payload(&payload, args.format.into(), Local::now())?;
    let path = artifact.write_to(&args.out).await?;
    output::print_success("Backup realizado com sucesso!");
    output::print_kv("Arquivo", &path.display().to_string());
    Ok(())
}

/// Restore a backup file.
///
/// JSON backups are sent to the restore endpoint as a whole; text backups
/// are replayed one registration at a time.
pub async fn restore(client: &DeviceClient, args: &RestoreArgs) -> Result<(), AppError> {
    let contents = tokio::fs::read_to_string(&args.path).await?;
    let is_json = args
        .path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        let payload: Value = serde_json::from_str(&contents)?;
        let count = users_in(&payload).len();
        client
            .restore(&payload)
            .await?
            .into_result("Erro ao restaurar backup")?;
        output::print_success(&format!("Backup restaurado ({count} usuários)"));
        return Ok(());
    }

    let users = parse_text(&contents);
    if users.is_empty() {
        return Err(AppError::validation("Não há dados para restaurar."));
    }
    let mut restored = 0;
    for user in &users {
        match client.add_user(user).await?.into_result("Erro ao adicionar usuário") {
            Ok(_) => restored += 1,
            Err(e) => output::print_warning(&format!("{} ({}): {}", user.name, user.uid, e.message)),
        }
    }
    output::print_success(&format!("{restored} de {} usuários restaurados", users.len()));
    Ok(())
}
