use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use guildkeeper_bot::backup::BackupStore;
use guildkeeper_bot::config::BotConfig;
use guildkeeper_bot::interactions::Dispatcher;
use guildkeeper_bot::maintenance::MaintenanceService;
use guildkeeper_bot::platform::GuildApi;
use guildkeeper_bot::platform::discord::DiscordClient;
use guildkeeper_bot::platform::memory::MemoryPlatform;

/// Guildkeeper - guild backups and maintenance mode
#[derive(Parser, Debug)]
#[command(name = "guildkeeper")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true, default_value = "guildkeeper.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Inspect the backup store without contacting the platform
    Backups {
        #[command(subcommand)]
        action: BackupsAction,
    },

    /// Read bot commands from stdin and run them against one guild
    Console {
        /// Guild to operate on
        #[arg(long)]
        guild: String,

        /// Use an in-memory guild instead of the REST API
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
enum BackupsAction {
    /// List stored backups
    List,
    /// Print a backup as JSON
    Show { id: String },
    /// Delete a backup
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = BotConfig::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    match &config.source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("No config file found at {}, using defaults", cli.config.display()),
    }

    let store = BackupStore::new(&config.storage.backup_dir);
    store
        .ensure_dir()
        .with_context(|| format!("cannot use backup directory {}", store.dir().display()))?;

    match cli.command {
        Commands::Backups { action } => run_backups(&store, action),
        Commands::Console { guild, dry_run } => {
            let api: Arc<dyn GuildApi> = if dry_run {
                let platform = MemoryPlatform::new();
                platform.insert_guild(MemoryPlatform::empty_guild(&guild, "Dry run"));
                Arc::new(platform)
            } else {
                let Some(token) = config.bot.token.clone() else {
                    bail!("no bot token configured; set DISCORD_TOKEN or use --dry-run");
                };
                Arc::new(DiscordClient::new(token, config.bot.api_base_url.clone()))
            };
            let maintenance = MaintenanceService::new(
                config.maintenance.channel_name.clone(),
                config.maintenance.announcement.clone(),
            );
            let dispatcher = Dispatcher::new(api, store, maintenance);
            run_console(&dispatcher, &guild).await
        }
    }
}

fn run_backups(store: &BackupStore, action: BackupsAction) -> anyhow::Result<()> {
    match action {
        BackupsAction::List => {
            let snapshots = store.list()?;
            if snapshots.is_empty() {
                println!("No backups found.");
            }
            for snapshot in snapshots {
                println!("{}  {}", snapshot.id, snapshot.summary());
            }
        }
        BackupsAction::Show { id } => {
            let snapshot = store.load(&id)?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        BackupsAction::Delete { id } => {
            if store.delete(&id)? {
                println!("Deleted backup {id}");
            } else {
                bail!("Backup not found: {id}");
            }
        }
    }
    Ok(())
}

async fn run_console(dispatcher: &Dispatcher, guild_id: &str) -> anyhow::Result<()> {
    info!(%guild_id, "console ready, reading commands from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(reply) = dispatcher.handle_line(guild_id, &line).await {
            println!("{}", reply.content);
        }
    }
    info!(%guild_id, "stdin closed, shutting down");
    Ok(())
}
