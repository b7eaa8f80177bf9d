//! Realtime event tail.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use cafeteira_client::DeviceClient;
use cafeteira_core::config::AppConfig;
use cafeteira_core::error::AppError;
use cafeteira_core::session::SessionStore;
use cafeteira_realtime::{ConnectionManager, InboundMessage, WsConnector};

use crate::output;

/// Print realtime events until Ctrl-C.
pub async fn execute(client: &DeviceClient, config: &AppConfig) -> Result<(), AppError> {
    let session = client
        .check_auth()
        .await?
        .into_session()
        .ok_or_else(|| AppError::unauthorized("Autenticação necessária"))?;

    let store = SessionStore::new();
    store.set(session);
    let connector = Arc::new(WsConnector::new(client.clone(), config.realtime.path.clone()));
    let manager = ConnectionManager::spawn(connector, store, &config.realtime);
    let mut inbound = manager.subscribe();
    let mut state = manager.watch_state();
    manager.connect();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                output::print_kv("Conexão", current.as_str());
            }
            message = inbound.recv() => match message {
                Ok(message) => println!("{}", describe(&message)),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Realtime events skipped"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    manager.shutdown().await;
    Ok(())
}

/// One-line description of a realtime event.
fn describe(message: &InboundMessage) -> String {
    match message {
        InboundMessage::CoffeeServed(served) => format!("☕ Café servido para {}", served.user_name),
        InboundMessage::RfidEvent(event) => {
            let icon = if event.success { "✅" } else { "⚠️" };
            format!("{icon} {}: {}", event.user_name, event.action)
        }
        InboundMessage::LogEntry(entry) => format!(
            "📝 [{}] {}",
            entry.level().as_str().to_uppercase(),
            entry.message()
        ),
        InboundMessage::Alert(alert) => format!("🔔 {} ({})", alert.message, alert.severity),
        InboundMessage::NewRfidUid(scanned) => format!("💳 Novo cartão: {}", scanned.uid),
        InboundMessage::UserActivity(activity) => {
            format!("👤 {} {}", activity.uid, serde_json::Value::Object(activity.changes.clone()))
        }
        InboundMessage::UserList(users) => format!("👥 {} usuários", users.len()),
        InboundMessage::SystemStatus(_) | InboundMessage::FullStatus(_) => {
            format!("📊 {}", message.kind())
        }
        InboundMessage::Unknown { kind } => format!("❔ {kind}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cafeteira_realtime::message::{CoffeeServed, RfidEvent};

    #[test]
    fn test_describe_events() {
        let served = InboundMessage::CoffeeServed(CoffeeServed {
            user_name: "Ana".into(),
            uid: None,
        });
        assert_eq!(describe(&served), "☕ Café servido para Ana");

        let denied = InboundMessage::RfidEvent(RfidEvent {
            user_name: "Joana".into(),
            action: "Sem créditos".into(),
            success: false,
        });
        assert_eq!(describe(&denied), "⚠️ Joana: Sem créditos");
    }
}
