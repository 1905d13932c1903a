//! Livefeed CLI
//!
//! Follows a feed stream over its live-update channel and logs content as
//! it is announced.
//!
//! Run with: cargo run -- --page-url https://social.example.org/ --stream public

use anyhow::Context;
use clap::{Parser, Subcommand};
use livefeed::channel::{ChannelManager, PageLocation, WsTransport};
use livefeed::config::{generate_default_config, Config, LoggingConfig};
use livefeed::store::FeedStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "livefeed")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Follow a feed stream over its live-update channel")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: standard locations, then environment)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// URL of the page hosting the stream
    #[arg(long)]
    page_url: Option<String>,

    /// Stream to follow
    #[arg(short, long)]
    stream: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and log announced content until interrupted (default)
    Listen,
    /// Print a default config file
    PrintConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::PrintConfig) = cli.command {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {:?}", path))?,
        None => Config::load_default(),
    };
    if let Some(page_url) = cli.page_url {
        config.channel.page_url = page_url;
    }
    if let Some(stream) = cli.stream {
        config.channel.stream = stream;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging);

    tracing::info!("Livefeed v{}", env!("CARGO_PKG_VERSION"));

    let page = PageLocation::parse(&config.channel.page_url)?;
    let store = Arc::new(FeedStore::new(config.channel.stream.clone()));

    let manager = ChannelManager::new(
        config.manager_config(),
        page,
        store.clone(),
        Arc::new(WsTransport::new()),
    );
    manager.start()?;

    tracing::info!(stream = %config.channel.stream, "Following stream");

    let mut states = manager.subscribe_state();
    let mut drain = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                tracing::info!(state = %state, "Channel state");
            }
            _ = drain.tick() => {
                for content_id in store.take_new_content() {
                    tracing::info!(content_id = %content_id, "New content");
                }
            }
        }
    }

    manager.shutdown().await;
    tracing::info!("Channel stats: {}", manager.stats());

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("livefeed={}", config.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
