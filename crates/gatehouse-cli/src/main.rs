//! Gatehouse CLI - operator tasks against the account store
//!
//! Usage:
//!   gatehouse create-user --email <email> --username <name> --password <pw>
//!   gatehouse set-active <id> <true|false>
//!   gatehouse set-staff <id> <true|false>
//!   gatehouse flush-expired-tokens
//!   gatehouse show-config

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use gatehouse_api::auth::{RegistrationRequest, SessionService};
use gatehouse_api::error::AppError;
use gatehouse_core::{open_stores, AppConfig, StoreBackend};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "gatehouse")]
#[command(about = "Gatehouse account and session administration")]
#[command(version)]
struct Cli {
    /// TOML configuration file (defaults to $GATEHOUSE_CONFIG)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Create an account
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        /// Grant staff status
        #[arg(long)]
        staff: bool,
    },
    /// Activate or deactivate an account
    SetActive {
        id: Uuid,
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },
    /// Grant or revoke staff status
    SetStaff {
        id: Uuid,
        #[arg(action = clap::ArgAction::Set)]
        staff: bool,
    },
    /// Delete blacklist entries whose tokens have expired
    FlushExpiredTokens,
    /// Print the effective configuration with secrets redacted
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config).context("Failed to load configuration")?;

    if let Commands::ShowConfig = cli.command {
        print!("{}", toml::to_string_pretty(&config.redacted())?);
        return Ok(());
    }

    if config.database.backend == StoreBackend::Memory {
        tracing::warn!("Store backend is in-memory; changes are discarded on exit");
    }

    let stores = open_stores(&config.database)
        .await
        .context("Failed to open account store")?;

    match cli.command {
        Commands::CreateUser {
            email,
            username,
            password,
            first_name,
            last_name,
            staff,
        } => {
            let sessions = SessionService::new(&stores, &config)?;
            let request = RegistrationRequest {
                email: Some(email),
                username: Some(username),
                password: Some(password),
                first_name,
                last_name,
            };

            let registration = match request.validate(config.auth.password_complexity) {
                Ok(registration) => registration,
                Err(errors) => bail!("{}", serde_json::to_string_pretty(&errors)?),
            };

            match sessions.create_account(registration, staff).await {
                Ok(account) => println!("Created {} ({})", account, account.id),
                Err(AppError::Validation(errors)) => {
                    bail!("{}", serde_json::to_string_pretty(&errors)?)
                }
                Err(e) => return Err(e).context("Failed to create account"),
            }
        }
        Commands::SetActive { id, active } => {
            let account = stores.accounts.set_active(id, active).await?;
            println!("{} is_active={}", account, account.is_active);
        }
        Commands::SetStaff { id, staff } => {
            let account = stores.accounts.set_staff(id, staff).await?;
            println!("{} is_staff={}", account, account.is_staff);
        }
        Commands::FlushExpiredTokens => {
            let sessions = SessionService::new(&stores, &config)?;
            let removed = sessions.registry().prune_expired(chrono::Utc::now()).await?;
            println!("Removed {removed} expired blacklist entries");
        }
        Commands::ShowConfig => {}
    }

    Ok(())
}
