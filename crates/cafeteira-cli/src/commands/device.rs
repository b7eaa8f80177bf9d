//! Device control commands.

use clap::Args;

use cafeteira_client::DeviceClient;
use cafeteira_core::error::AppError;
use cafeteira_core::types::StatusSummary;

use crate::output::{self, OutputFormat};

/// Phrase that must be typed before wiping the device.
const CLEAR_ALL_CONFIRMATION: &str = "LIMPAR TUDO";

/// Arguments for commands that ask for confirmation
#[derive(Debug, Args)]
pub struct ConfirmArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for `clear-data`
#[derive(Debug, Args)]
pub struct ClearDataArgs {
    /// Confirmation phrase (will prompt if not provided)
    #[arg(long)]
    pub confirm: Option<String>,
}

/// Print device status.
pub async fn status(client: &DeviceClient, format: OutputFormat) -> Result<(), AppError> {
    let stats = client.status().await?;
    if format == OutputFormat::Json {
        output::print_json(&stats);
        return Ok(());
    }

    let summary = StatusSummary::from_stats(&stats);
    let capacity = summary
        .max_capacity
        .map(|max| format!("{} / {max}", summary.remaining.max(0)))
        .unwrap_or_else(|| summary.remaining.max(0).to_string());
    output::print_kv("Sistema", if summary.is_busy { "Ocupado" } else { "Online" });
    output::print_kv("Café", if summary.is_empty() { "Vazio" } else { "Pronto" });
    output::print_kv("Restantes", &capacity);
    output::print_kv("Servidos", &summary.total_served.to_string());
    output::print_kv("Usuários", &summary.total_users.to_string());
    output::print_kv("Ativos hoje", &summary.active_today.to_string());
    output::print_kv("WiFi", if summary.wifi_connected { "Conectado" } else { "Desconectado" });
    if summary.uptime_ms > 0 {
        output::print_kv("Uptime", &format!("{}s", summary.uptime_ms / 1000));
    }
    if let Some(event) = &summary.last_event {
        output::print_kv("Último evento", event);
    }
    Ok(())
}

/// Print usage statistics as JSON.
pub async fn stats(client: &DeviceClient) -> Result<(), AppError> {
    output::print_json(&client.stats().await?);
    Ok(())
}

/// Dispense one coffee.
pub async fn serve(client: &DeviceClient) -> Result<(), AppError> {
    client
        .serve_coffee()
        .await?
        .into_result("Erro ao servir café")?;
    output::print_success("Café servido manualmente!");
    Ok(())
}

/// Refill the bottle.
pub async fn refill(client: &DeviceClient, args: &ConfirmArgs) -> Result<(), AppError> {
    if !super::confirm("Isso irá restaurar a contagem de cafés para o máximo. Confirmar?", args.yes)? {
        output::print_warning("Operação cancelada.");
        return Ok(());
    }
    client
        .refill_coffee()
        .await?
        .into_result("Erro ao reabastecer")?;
    output::print_success("Garrafa reabastecida!");
    Ok(())
}

/// Restart the device.
pub async fn reset(client: &DeviceClient, args: &ConfirmArgs) -> Result<(), AppError> {
    if !super::confirm("O sistema será reiniciado. Confirmar?", args.yes)? {
        output::print_warning("Operação cancelada.");
        return Ok(());
    }
    client.system_reset().await?;
    output::print_success("Sistema reiniciando... Aguarde alguns instantes.");
    Ok(())
}

/// Delete every user and counter after the typed confirmation.
pub async fn clear_data(client: &DeviceClient, args: &ClearDataArgs) -> Result<(), AppError> {
    let typed = match &args.confirm {
        Some(text) => text.clone(),
        None => dialoguer::Input::<String>::new()
            .with_prompt(format!("Digite '{CLEAR_ALL_CONFIRMATION}' para confirmar"))
            .allow_empty(true)
            .interact_text()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?,
    };
    if typed.trim() != CLEAR_ALL_CONFIRMATION {
        output::print_warning("Operação cancelada.");
        return Ok(());
    }

    client
        .clear_all_data()
        .await?
        .into_result("Erro ao limpar dados")?;
    output::print_success("Todos os dados foram apagados!");
    Ok(())
}
