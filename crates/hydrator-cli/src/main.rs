#![deny(unsafe_code)]

//! Hydrator CLI: runs the proxy and offers one-shot hydration tools.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hydrator_config::AppConfig;
use hydrator_core::proxy::{self, ProxyState};
use hydrator_core::provider::create_website_provider;
use hydrator_core::{BookLibrary, ChatHydrator, CommandRegistry, MemoryCache, TtlCache};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Context hydrator: enriches chat requests with fetched context before
/// forwarding them to a model endpoint.
#[derive(Parser)]
#[command(
    name = "hydrator",
    version = hydrator_core::build_info::LONG_VERSION,
    about,
    long_about = None
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "hydrator.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the hydrating proxy.
    Serve,

    /// Hydrate one chat body and print the result.
    Hydrate {
        /// JSON file with the chat body. Reads stdin when omitted.
        file: Option<PathBuf>,
    },

    /// List the books found in the configured directory.
    Books,

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = load_config(&cli.config).await?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(log_filter(cli.verbose, &loaded.config))),
        )
        .init();
    if !loaded.from_file {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }
    let config = loaded.config;

    match cli.command {
        Commands::Serve => cmd_serve(config).await?,
        Commands::Hydrate { file } => cmd_hydrate(config, file.as_deref()).await?,
        Commands::Books => cmd_books(&config).await,
        Commands::Config { show } => cmd_config(&cli.config, &config, show)?,
    }

    Ok(())
}

async fn cmd_serve(config: AppConfig) -> Result<()> {
    info!(version = hydrator_core::build_info::LONG_VERSION, "Starting hydrator");
    let hydrator = build_hydrator(&config).await;
    let state = Arc::new(ProxyState::from_config(&config.proxy, hydrator));

    proxy::serve(&config.proxy, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown requested");
    })
    .await?;
    Ok(())
}

async fn cmd_hydrate(config: AppConfig, file: Option<&Path>) -> Result<()> {
    let raw = match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read stdin")?;
            buf
        }
    };
    let body: serde_json::Value = serde_json::from_str(&raw).context("input is not JSON")?;

    let hydrator = build_hydrator(&config).await;
    let hydrated = hydrator.hydrate_value(body).await?;
    println!("{}", serde_json::to_string_pretty(&hydrated)?);
    Ok(())
}

async fn cmd_books(config: &AppConfig) {
    let library = BookLibrary::scan(&config.books.dir).await;
    if library.is_empty() {
        println!("No books found in '{}'.", config.books.dir);
        return;
    }
    for book in library.books() {
        println!("{book}");
    }
}

fn cmd_config(config_path: &Path, config: &AppConfig, show: bool) -> Result<()> {
    if show {
        let toml_str =
            toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

/// Wire caches, providers and the command registry into a hydrator.
async fn build_hydrator(config: &AppConfig) -> Arc<ChatHydrator> {
    let ttl_cache = Arc::new(TtlCache::from_config(&config.cache).await);
    let website = create_website_provider(&config.website, ttl_cache);
    let library = Arc::new(BookLibrary::scan(&config.books.dir).await);
    let registry = CommandRegistry::with_defaults(library);

    Arc::new(
        ChatHydrator::new(Arc::new(MemoryCache::new()))
            .with_website_provider(website)
            .with_command_provider(Arc::new(registry)),
    )
}

struct LoadedConfig {
    config: AppConfig,
    from_file: bool,
}

async fn load_config(path: &Path) -> Result<LoadedConfig> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("invalid config at {}", path.display()))?;
        Ok(LoadedConfig {
            config,
            from_file: true,
        })
    } else {
        Ok(LoadedConfig {
            config: AppConfig::from_env()?,
            from_file: false,
        })
    }
}

/// `-v` wins over the configured level.
fn log_filter(verbose: u8, config: &AppConfig) -> String {
    match verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}
