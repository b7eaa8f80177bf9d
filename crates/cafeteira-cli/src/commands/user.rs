//! User management CLI commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use cafeteira_client::DeviceClient;
use cafeteira_core::error::AppError;
use cafeteira_core::types::{NewUser, User};

use crate::output::{self, OutputFormat};

/// Arguments for user commands
#[derive(Debug, Args)]
pub struct UserArgs {
    /// User subcommand
    #[command(subcommand)]
    pub command: UserCommand,
}

/// User subcommands
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// List registered cards
    List,
    /// Register a card
    Add {
        /// Card UID
        uid: String,
        /// Display name
        name: String,
    },
    /// Remove a card
    Remove {
        /// Card UID
        uid: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Look up one card
    Show {
        /// Card UID
        uid: String,
    },
}

/// User display row for table output
#[derive(Debug, Serialize, Tabled)]
struct UserRow {
    /// Name
    #[tabled(rename = "Nome")]
    name: String,
    /// Card UID
    #[tabled(rename = "UID")]
    uid: String,
    /// Credits
    #[tabled(rename = "Créditos")]
    credits: u32,
    /// Active flag
    #[tabled(rename = "Ativo")]
    active: String,
}

impl From<&User> for UserRow {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            uid: user.uid.clone(),
            credits: user.credits,
            active: if user.is_active { "sim" } else { "não" }.to_string(),
        }
    }
}

/// Execute user commands
pub async fn execute(args: &UserArgs, client: &DeviceClient, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        UserCommand::List => {
            let users = client.list_users().await?;
            let rows: Vec<UserRow> = users.iter().map(UserRow::from).collect();
            output::print_list(&rows, format, "Nenhum usuário cadastrado");
        }
        UserCommand::Add { uid, name } => {
            let user = NewUser::new(uid, name);
            if !user.is_complete() {
                return Err(AppError::validation("Por favor, preencha todos os campos."));
            }
            client
                .add_user(&user)
                .await?
                .into_result("Erro ao adicionar usuário")?;
            output::print_success("Usuário adicionado com sucesso!");
        }
        UserCommand::Remove { uid, yes } => {
            if !super::confirm(&format!("Remover o usuário {uid}?"), *yes)? {
                output::print_warning("Operação cancelada.");
                return Ok(());
            }
            client
                .remove_user(uid)
                .await?
                .into_result("Erro ao remover usuário")?;
            output::print_success("Usuário removido com sucesso!");
        }
        UserCommand::Show { uid } => {
            let uid = uid.trim();
            if uid.is_empty() {
                return Err(AppError::validation("Digite um UID para consultar."));
            }
            let lookup = client.lookup_user(uid).await?;
            if !lookup.success {
                return Err(AppError::application(
                    lookup
                        .message
                        .unwrap_or_else(|| "Usuário não encontrado".to_string()),
                ));
            }
            match format {
                OutputFormat::Table => {
                    output::print_kv("UID", lookup.uid.as_deref().unwrap_or(uid));
                    output::print_kv("Nome", lookup.name.as_deref().unwrap_or(""));
                    output::print_kv("Créditos", &lookup.credits.unwrap_or(0).to_string());
                }
                OutputFormat::Json => output::print_json(&lookup),
            }
        }
    }

    Ok(())
}
