//! `freightdesk` command-line entry point.
//!
//! Drives the sync layer from a terminal: sign in, inspect and replay the
//! offline queue, manage dead letters. Configuration comes from
//! `FREIGHTDESK_*` environment variables.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use freightdesk_client::{AppContext, ClientConfig, LogNotifier};
use freightdesk_core::WriteId;

#[derive(Parser)]
#[command(
    name = "freightdesk",
    version = env!("CARGO_PKG_VERSION"),
    about = "Offline-aware sync client for the FreightDesk logistics backend",
    long_about = None
)]
struct Cli {
    /// Override the state database path
    #[arg(global = true, long = "state")]
    state: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login { email: String, password: String },

    /// Forget the stored session
    Logout,

    /// Show the session and offline queue
    Status,

    /// Mark the client online and replay queued writes
    Sync,

    /// List writes the queue gave up on
    DeadLetters,

    /// Move a dead letter back to the queue
    Retry { id: String },

    /// Drop a dead letter
    Discard { id: String },
}

#[tokio::main]
async fn main() {
    freightdesk_observability::init_pretty();

    if let Err(err) = run(Cli::parse()).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ClientConfig::from_env().context("invalid configuration")?;
    if let Some(state) = cli.state {
        config.state_path = Some(state);
    }

    let ctx = AppContext::open(config, Arc::new(LogNotifier)).await?;

    match cli.command {
        Commands::Login { email, password } => {
            let credential = ctx
                .client
                .login(&email, &password)
                .await
                .context("login failed")?;
            let role = credential.role().map(|r| r.to_string()).unwrap_or_default();
            println!("Signed in as {email} ({role})");
        }
        Commands::Logout => {
            ctx.client.logout().await.context("logout failed")?;
            println!("Signed out");
        }
        Commands::Status => {
            let credential = ctx.credentials.snapshot();
            match (&credential.user, credential.is_authenticated()) {
                (Some(user), true) => println!(
                    "Signed in: {} ({})",
                    user.email.as_deref().unwrap_or("unknown"),
                    user.role
                ),
                _ => println!("Not signed in"),
            }
            println!("API: {}", ctx.client.base_url());

            let pending = ctx.queue.pending().await;
            println!("Queued writes: {}", pending.len());
            for write in &pending {
                println!(
                    "  {}  {} {}  attempts={}{}",
                    write.id,
                    write.method,
                    write.path,
                    write.attempts,
                    write
                        .last_error
                        .as_deref()
                        .map(|e| format!("  last error: {e}"))
                        .unwrap_or_default()
                );
            }
            println!("Dead letters: {}", ctx.queue.dead_letters().await.len());
        }
        Commands::Sync => {
            ctx.connectivity.set_online();
            let report = ctx.queue.replay().await.context("replay failed")?;
            println!(
                "Synced {}, still queued {}, dead-lettered {}{}",
                report.synced.len(),
                report.retained.len(),
                report.dead_lettered.len(),
                if report.halted { " (stopped early)" } else { "" }
            );
        }
        Commands::DeadLetters => {
            let letters = ctx.queue.dead_letters().await;
            if letters.is_empty() {
                println!("No dead letters");
            }
            for letter in letters {
                println!(
                    "{}  {} {}  failed {}: {}",
                    letter.write.id,
                    letter.write.method,
                    letter.write.path,
                    letter.failed_at.to_rfc3339(),
                    letter.reason
                );
            }
        }
        Commands::Retry { id } => {
            let id: WriteId = id.parse().context("invalid write id")?;
            ctx.queue.retry_dead_letter(id).await?;
            println!("Requeued {id}");
        }
        Commands::Discard { id } => {
            let id: WriteId = id.parse().context("invalid write id")?;
            ctx.queue.discard_dead_letter(id).await?;
            println!("Discarded {id}");
        }
    }

    Ok(())
}
