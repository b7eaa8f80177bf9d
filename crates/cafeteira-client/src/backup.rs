//! Locally generated backup files.
//!
//! The device only returns the raw backup payload; the file itself is
//! built on the client. Text backups list one `ADD <uid> <name>` command
//! per user (the same format the device's serial console accepts), JSON
//! backups are the pretty-printed payload.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde_json::Value;

use cafeteira_core::types::{NewUser, User};
use cafeteira_core::{AppError, AppResult};

/// File format of a backup artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupFormat {
    /// `ADD <uid> <name>` lines, CRLF terminated.
    Text,
    /// Pretty-printed JSON payload.
    Json,
}

impl BackupFormat {
    /// File extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
        }
    }
}

/// A backup file ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    /// `backup_cafeteira_<YYYY-MM-DD>.<ext>`.
    pub file_name: String,
    /// File contents.
    pub contents: String,
    /// Format of `contents`.
    pub format: BackupFormat,
}

impl BackupArtifact {
    /// Build an artifact from the device's backup payload.
    ///
    /// Text backups need at least one user.
    pub fn from_payload(payload: &Value, format: BackupFormat, now: DateTime<Local>) -> AppResult<Self> {
        let contents = match format {
            BackupFormat::Text => {
                let users = users_in(payload);
                if users.is_empty() {
                    return Err(AppError::validation("Não há dados para fazer backup."));
                }
                render_text(&users, now)
            }
            BackupFormat::Json => serde_json::to_string_pretty(payload)?,
        };

        Ok(Self {
            file_name: file_name(format, now),
            contents,
            format,
        })
    }

    /// Write the artifact into `dir`, returning the full path.
    pub async fn write_to(&self, dir: &Path) -> AppResult<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, self.contents.as_bytes()).await?;
        tracing::info!(path = %path.display(), bytes = self.contents.len(), "Backup written");
        Ok(path)
    }
}

/// `backup_cafeteira_<UTC date>.<ext>`.
pub fn file_name(format: BackupFormat, now: DateTime<Local>) -> String {
    format!(
        "backup_cafeteira_{}.{}",
        now.with_timezone(&Utc).format("%Y-%m-%d"),
        format.extension()
    )
}

/// Users listed in a backup payload (`users` or legacy `usuarios`).
///
/// Rows are decoded one at a time; a malformed row is skipped.
pub fn users_in(payload: &Value) -> Vec<User> {
    let Some(rows) = payload
        .get("users")
        .or_else(|| payload.get("usuarios"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    rows.iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value::<User>(row.clone()) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping malformed user in backup payload");
                None
            }
        })
        .collect()
}

fn render_text(users: &[User], now: DateTime<Local>) -> String {
    let mut text = format!(
        "// BACKUP DOS DADOS - {}\r\n\r\n",
        now.format("%d/%m/%Y %H:%M:%S")
    );
    for user in users {
        text.push_str(&format!("ADD {} {}\r\n", user.uid, user.name));
    }
    text
}

/// Parse a text backup back into registrations. Comment and blank lines
/// are skipped, as are `ADD` lines without a name.
pub fn parse_text(contents: &str) -> Vec<NewUser> {
    contents
        .lines()
        .map(str::trim)
        .filter_map(|line| {
            let rest = line.strip_prefix("ADD ")?;
            let (uid, name) = rest.trim().split_once(' ')?;
            let user = NewUser::new(uid, name);
            user.is_complete().then_some(user)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()
    }

    #[test]
    fn test_text_backup_layout() {
        let payload = json!({"usuarios": [
            {"uid": "AB12", "nome": "Joana", "creditos": 3},
            {"uid": "CD34", "nome": "Ana Maria", "creditos": 0}
        ]});
        let artifact = BackupArtifact::from_payload(&payload, BackupFormat::Text, fixed_now()).unwrap();

        assert!(artifact.file_name.starts_with("backup_cafeteira_"));
        assert!(artifact.file_name.ends_with(".txt"));
        assert!(artifact.contents.starts_with("// BACKUP DOS DADOS - 09/03/2024 14:05:00\r\n\r\n"));
        assert!(artifact.contents.contains("ADD AB12 Joana\r\n"));
        assert!(artifact.contents.ends_with("ADD CD34 Ana Maria\r\n"));
    }

    #[test]
    fn test_empty_text_backup_is_refused() {
        let err = BackupArtifact::from_payload(&json!({"usuarios": []}), BackupFormat::Text, fixed_now())
            .unwrap_err();
        assert_eq!(err.message, "Não há dados para fazer backup.");
    }

    #[test]
    fn test_json_backup_keeps_payload() {
        let payload = json!({"users": [], "settings": {"maxCoffees": 100}});
        let artifact = BackupArtifact::from_payload(&payload, BackupFormat::Json, fixed_now()).unwrap();
        assert!(artifact.file_name.ends_with(".json"));
        let parsed: Value = serde_json::from_str(&artifact.contents).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn test_parse_text_round_trips_names_with_spaces() {
        let users = parse_text("// BACKUP\r\n\r\nADD AB12 Joana\r\nADD cd34 Ana Maria\r\nADD EF56\r\n");
        assert_eq!(users.len(), 2);
        assert_eq!(users[1], NewUser::new("CD34", "Ana Maria"));
    }

    #[tokio::test]
    async fn test_write_to_creates_file() {
        let dir = std::env::temp_dir().join(format!("cafeteira-backup-{}", std::process::id()));
        let artifact = BackupArtifact {
            file_name: "backup_cafeteira_2024-03-09.txt".into(),
            contents: "ADD AB12 Joana\r\n".into(),
            format: BackupFormat::Text,
        };
        let path = artifact.write_to(&dir).await.unwrap();
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(written, artifact.contents);
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[test]
    fn test_malformed_user_rows_are_skipped() {
        let payload = json!({
            "usuarios": [
                {"uid": "AB12", "nome": "Joana"},
                {"uid": 42},
                {"uid": "CD34", "nome": "Ana"}
            ]
        });

        let users = users_in(&payload);
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].name, "Joana");
        assert_eq!(users[1].uid, "CD34");

        let artifact = BackupArtifact::from_payload(&payload, BackupFormat::Text, fixed_now()).unwrap();
        assert!(artifact.contents.contains("ADD AB12 Joana\r\n"));
        assert!(!artifact.contents.contains("42"));
    }
}
