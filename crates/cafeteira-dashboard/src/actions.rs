//! Admin commands with alert feedback.
//!
//! Every command reports its outcome to the alert sink. A rejected command
//! shows the device's message verbatim; a request that never completed
//! shows a fixed connection-error text. Commands that change what the dashboard shows refresh
//! the active view afterwards.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use serde_json::Value;
use tracing::{info, warn};

use cafeteira_client::backup::parse_text;
use cafeteira_client::{BackupArtifact, BackupFormat, DeviceClient};
use cafeteira_core::error::{AppError, ErrorKind};
use cafeteira_core::types::{ApiResponse, NewUser, UserLookup};
use cafeteira_core::AppResult;

use crate::alerts::AlertSink;
use crate::refresh::RefreshCoordinator;

/// Phrase that must be typed to wipe the device.
pub const CLEAR_ALL_CONFIRMATION: &str = "LIMPAR TUDO";

/// Alert texts for one command.
struct Messages {
    /// Shown on success when the device sends no message.
    success: &'static str,
    /// Shown on `success: false` when the device sends no message.
    failure: &'static str,
    /// Shown when the request failed to complete.
    connection: &'static str,
}

const SERVE: Messages = Messages {
    success: "Café servido manualmente!",
    failure: "Erro ao servir café",
    connection: "Erro de conexão ao servir café",
};

const REFILL: Messages = Messages {
    success: "Garrafa reabastecida!",
    failure: "Erro ao reabastecer",
    connection: "Erro de conexão ao reabastecer",
};

const ADD_USER: Messages = Messages {
    success: "Usuário adicionado com sucesso!",
    failure: "Erro ao adicionar usuário",
    connection: "Erro ao adicionar usuário",
};

const REMOVE_USER: Messages = Messages {
    success: "Usuário removido com sucesso!",
    failure: "Erro ao remover usuário",
    connection: "Erro ao remover usuário",
};

const CLEAR_ALL: Messages = Messages {
    success: "Todos os dados foram apagados!",
    failure: "Erro ao limpar dados",
    connection: "Erro ao limpar dados",
};

const RESTORE: Messages = Messages {
    success: "Backup restaurado com sucesso!",
    failure: "Erro ao restaurar backup",
    connection: "Erro de conexão ao restaurar backup",
};

/// Admin command dispatcher.
#[derive(Debug, Clone)]
pub struct AdminActions {
    /// REST client.
    client: DeviceClient,
    /// Alert sink.
    alerts: AlertSink,
    /// Refresh coordinator, for post-command refreshes and 401 handling.
    refresh: Arc<RefreshCoordinator>,
}

impl AdminActions {
    /// Create a dispatcher.
    pub fn new(client: DeviceClient, alerts: AlertSink, refresh: Arc<RefreshCoordinator>) -> Self {
        Self {
            client,
            alerts,
            refresh,
        }
    }

    /// Dispense one coffee. The view is only refreshed on success.
    pub async fn serve_coffee(&self) -> AppResult<String> {
        let result = self.client.serve_coffee().await;
        let message = self.complete(result, &SERVE).await?;
        self.refresh_view().await;
        Ok(message)
    }

    /// Reset the bottle counter to full capacity.
    pub async fn refill_coffee(&self) -> AppResult<String> {
        let result = self.client.refill_coffee().await;
        let message = self.complete(result, &REFILL).await?;
        self.refresh_view().await;
        Ok(message)
    }

    /// Reboot the device. The device's answer is not inspected; it may
    /// go away before replying in full.
    pub async fn system_reset(&self) -> AppResult<()> {
        match self.client.system_reset().await {
            Ok(_) => {
                info!("System reset requested");
                self.alerts
                    .info("Sistema reiniciando... Aguarde alguns instantes.");
                Ok(())
            }
            Err(e) => Err(self.fail(e, "Erro ao reiniciar sistema").await),
        }
    }

    /// Wipe every user and counter. Refused unless `confirmation` is the
    /// exact phrase [`CLEAR_ALL_CONFIRMATION`].
    pub async fn clear_all_data(&self, confirmation: &str) -> AppResult<String> {
        if confirmation != CLEAR_ALL_CONFIRMATION {
            self.alerts.info("Operação cancelada.");
            return Err(AppError::validation("Operação cancelada."));
        }
        let result = self.client.clear_all_data().await;
        let message = self.complete(result, &CLEAR_ALL).await?;
        self.refresh_view().await;
        Ok(message)
    }

    /// Delete the device logs and the cached log lines.
    pub async fn clear_logs(&self) -> AppResult<()> {
        match self.client.clear_logs().await {
            Ok(response) if response.success => {
                self.alerts.success("Logs limpos com sucesso!");
                self.refresh.clear_logs().await;
                Ok(())
            }
            Ok(_) => {
                self.alerts.error("Erro ao limpar logs");
                Err(AppError::application("Erro ao limpar logs"))
            }
            Err(e) => Err(self.fail(e, "Erro de conexão ao limpar logs").await),
        }
    }

    /// Register a card.
    pub async fn add_user(&self, uid: &str, name: &str) -> AppResult<String> {
        let user = NewUser::new(uid, name);
        if !user.is_complete() {
            self.alerts.warning("Por favor, preencha todos os campos.");
            return Err(AppError::validation("Por favor, preencha todos os campos."));
        }
        let result = self.client.add_user(&user).await;
        let message = self.complete(result, &ADD_USER).await?;
        self.refresh_view().await;
        Ok(message)
    }

    /// Remove a card.
    pub async fn remove_user(&self, uid: &str) -> AppResult<String> {
        let result = self.client.remove_user(uid).await;
        let message = self.complete(result, &REMOVE_USER).await?;
        self.refresh_view().await;
        Ok(message)
    }

    /// Look up one card.
    pub async fn lookup_user(&self, uid: &str) -> AppResult<UserLookup> {
        let uid = uid.trim();
        if uid.is_empty() {
            self.alerts.warning("Digite um UID para consultar.");
            return Err(AppError::validation("Digite um UID para consultar."));
        }
        match self.client.lookup_user(uid).await {
            Ok(lookup) => {
                if !lookup.success {
                    self.alerts.warning(
                        lookup
                            .message
                            .clone()
                            .unwrap_or_else(|| "Usuário não encontrado".to_string()),
                    );
                }
                Ok(lookup)
            }
            Err(e) => Err(self.fail(e, "Erro ao consultar usuário").await),
        }
    }

    /// Fetch the backup payload and write it into `dir`.
    pub async fn export_backup(&self, dir: &Path, format: BackupFormat) -> AppResult<PathBuf> {
        let payload = match self.client.backup().await {
            Ok(payload) => payload,
            Err(e) if e.kind == ErrorKind::Network => {
                return Err(self.fail(e, "Erro de conexão no backup").await);
            }
            Err(e) => {
                if e.kind == ErrorKind::Unauthorized {
                    self.refresh.unauthorized().await;
                } else {
                    self.alerts.error("Erro ao exportar dados");
                }
                return Err(e);
            }
        };

        let artifact = match BackupArtifact::from_payload(&payload, format, Local::now()) {
            Ok(artifact) => artifact,
            Err(e) => {
                self.alerts.warning(e.message.clone());
                return Err(e);
            }
        };

        match artifact.write_to(dir).await {
            Ok(path) => {
                self.alerts.success(match format {
                    BackupFormat::Text => "Backup realizado com sucesso!",
                    BackupFormat::Json => "Backup exportado com sucesso!",
                });
                Ok(path)
            }
            Err(e) => {
                warn!(error = %e, dir = %dir.display(), "Failed to write backup");
                self.alerts.error("Erro ao fazer backup");
                Err(e)
            }
        }
    }

    /// Restore a backup file: JSON goes to the restore endpoint, text
    /// backups are replayed one registration at a time.
    pub async fn restore_file(&self, path: &Path) -> AppResult<usize> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            self.alerts.error("Erro ao ler arquivo de backup");
            AppError::from(e)
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            let payload: Value = serde_json::from_str(&contents).map_err(|e| {
                self.alerts.error("Arquivo de backup inválido");
                AppError::from(e)
            })?;
            let count = cafeteira_client::backup::users_in(&payload).len();
            let result = self.client.restore(&payload).await;
            self.complete(result, &RESTORE).await?;
            self.refresh_view().await;
            return Ok(count);
        }

        let users = parse_text(&contents);
        if users.is_empty() {
            self.alerts.warning("Não há dados para restaurar.");
            return Err(AppError::validation("Não há dados para restaurar."));
        }
        let mut restored = 0;
        for user in &users {
            match self.client.add_user(user).await {
                Ok(response) if response.success => restored += 1,
                Ok(response) => {
                    warn!(uid = %user.uid, message = ?response.message, "Registration skipped during restore");
                }
                Err(e) => return Err(self.fail(e, RESTORE.connection).await),
            }
        }
        info!(restored, total = users.len(), "Text backup replayed");
        self.alerts
            .success(format!("{restored} de {} usuários restaurados", users.len()));
        self.refresh_view().await;
        Ok(restored)
    }

    /// Turn a command result into an alert and the device's message.
    async fn complete(&self, result: AppResult<ApiResponse>, messages: &Messages) -> AppResult<String> {
        let response = match result {
            Ok(response) => response,
            Err(e) => return Err(self.fail(e, messages.connection).await),
        };
        let device_message = response.message.filter(|m| !m.is_empty());
        if response.success {
            self.alerts.success(messages.success);
            return Ok(device_message.unwrap_or_else(|| messages.success.to_string()));
        }
        let message = device_message.unwrap_or_else(|| messages.failure.to_string());
        warn!(message = %message, "Command rejected by device");
        self.alerts.error(message.clone());
        Err(AppError::application(message))
    }

    /// Report a failed request. Unauthorized resets the session; device
    /// messages are shown as sent; everything else gets `fallback`.
    async fn fail(&self, err: AppError, fallback: &str) -> AppError {
        match err.kind {
            ErrorKind::Unauthorized | ErrorKind::Application => self.refresh.report(err, fallback).await,
            _ => {
                warn!(error = %err, "Command failed");
                self.alerts.error(fallback);
                err
            }
        }
    }

    async fn refresh_view(&self) {
        if let Err(e) = self.refresh.refresh_active().await {
            warn!(error = %e, "Refresh after command failed");
        }
    }
}
