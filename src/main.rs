//! # vidnest CLI
//!
//! ```bash
//! vidnest --config ./config/vidnest.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `vidnest init` | Create the SQLite database and apply the schema |
//! | `vidnest serve` | Start the HTTP API |
//! | `vidnest stats <username>` | Print a channel's dashboard totals |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use vidnest::store::{dashboard, users};
use vidnest::{config, db, logging, migrate, server};

/// vidnest: a social-video REST backend.
#[derive(Parser)]
#[command(name = "vidnest", version, about = "A social-video REST backend")]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/vidnest.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it against an existing database is safe.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Print dashboard totals for a channel.
    Stats {
        /// Channel username.
        username: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            logging::init(cfg.server.json_logs);
            server::run_server(cfg).await?;
        }
        Commands::Stats { username } => {
            let pool = db::connect(&cfg).await?;
            let user = users::find_by_login(&pool, Some(&username), None)
                .await?
                .with_context(|| format!("no channel named {}", username))?;
            let stats = dashboard::channel_stats(&pool, &user.id).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            pool.close().await;
        }
    }

    Ok(())
}
