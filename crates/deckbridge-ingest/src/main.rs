//! Deckbridge relay daemon and admin tool.
//!
//! # Usage
//!
//! ```bash
//! # Register a lane and where its posts go
//! deckbridge add-lane --heading Home --attribution @alice \
//!     --handle alice.bsky.social --app-password xxxx-xxxx-xxxx-xxxx
//!
//! # Relay a recorded capture end to end
//! deckbridge replay capture.jsonl
//!
//! # Inspect, back up, restore
//! deckbridge show
//! deckbridge export
//! deckbridge import tweetdeck-bluesky-config_2024-05-29T12-34-56.json
//! ```
//!
//! Endpoint URLs and queue timing come from `DECKBRIDGE_*` environment
//! variables (see [`deckbridge_ingest::Settings`]).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use deckbridge_core::LaneKey;
use deckbridge_core::metrics::{init_metrics, start_metrics_server};
use deckbridge_ingest::store::AddBindingOutcome;
use deckbridge_ingest::{
    AdminApi, Capture, ConfigStore, DedupLedger, DeliveryClient, DiscoveryConfig, DocumentCache,
    HttpDeliveryClient, IngestionQueue, LaneDiscovery, MemoryPage, PostPipeline, Settings,
    SqliteStore, export_filename,
};
use metrics::gauge;
use tracing_subscriber::EnvFilter;

/// Deckbridge relay.
#[derive(Parser, Debug)]
#[command(name = "deckbridge")]
#[command(about = "Relay deck lane posts to a publishing endpoint")]
#[command(version)]
struct Args {
    /// SQLite file holding configuration and the processed-post ledger
    #[arg(long, global = true, default_value = "./data/deckbridge.db")]
    store: PathBuf,

    /// Metrics HTTP server port (0 to disable)
    #[arg(long, global = true, default_value = "0")]
    metrics_port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a recorded capture through discovery, queue and delivery
    Replay {
        /// JSONL capture, one {heading, attribution, html} object per line
        capture: PathBuf,
    },

    /// Print configured lanes and ledger size
    Show,

    /// Bind a lane to destination credentials
    AddLane {
        #[arg(long)]
        heading: String,
        #[arg(long)]
        attribution: String,
        #[arg(long)]
        handle: String,
        #[arg(long, env = "DECKBRIDGE_APP_PASSWORD")]
        app_password: String,
    },

    /// Resume relaying a lane
    Enable { lane: String },

    /// Stop relaying a lane without removing it
    Disable { lane: String },

    /// Write lane bindings to a JSON file
    Export {
        /// Output path (default: timestamped file in the current directory)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Replace lane bindings from an exported JSON file
    Import { path: PathBuf },

    /// Remove all configuration and ledger state
    Reset {
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },

    /// Probe the endpoint's health route
    TestConnection,
}

/// Shared state for every command.
struct App {
    settings: Settings,
    config: ConfigStore,
    ledger: DedupLedger,
    delivery: Arc<dyn DeliveryClient>,
}

impl App {
    fn open(args: &Args) -> Result<Self> {
        let settings = Settings::from_env().context("Failed to load settings")?;

        let store = SqliteStore::open(&args.store)
            .with_context(|| format!("Failed to open store at {}", args.store.display()))?;
        let cache = Arc::new(DocumentCache::new(Arc::new(store)));
        let config = ConfigStore::new(Arc::clone(&cache));
        let ledger = DedupLedger::new(cache, settings.max_processed);

        let delivery = HttpDeliveryClient::new(settings.delivery())
            .context("Failed to build HTTP client")?;

        Ok(Self {
            settings,
            config,
            ledger,
            delivery: Arc::new(delivery),
        })
    }

    fn admin(&self) -> AdminApi {
        AdminApi::new(
            self.config.clone(),
            self.ledger.clone(),
            Arc::clone(&self.delivery),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("info".parse()?)
                .add_directive("deckbridge_ingest=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    if args.metrics_port > 0 {
        let metrics_handle = init_metrics();
        start_metrics_server(args.metrics_port, metrics_handle)
            .await
            .context("Failed to start metrics server")?;
    }

    let ctx = App::open(&args)?;

    match &args.command {
        Command::Replay { capture } => replay(&ctx, capture).await?,
        Command::Show => print!("{}", ctx.admin().summary()),
        Command::AddLane {
            heading,
            attribution,
            handle,
            app_password,
        } => match ctx
            .admin()
            .add_lane(heading, attribution, handle, app_password)?
        {
            AddBindingOutcome::Added => {
                println!("Added {}", LaneKey::from_parts(heading, attribution))
            }
            AddBindingOutcome::AlreadyExists => {
                bail!("{} is already configured", LaneKey::from_parts(heading, attribution))
            }
        },
        Command::Enable { lane } => set_enabled(&ctx, lane, true)?,
        Command::Disable { lane } => set_enabled(&ctx, lane, false)?,
        Command::Export { output } => {
            let json = ctx.admin().export()?;
            let path = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(export_filename(chrono::Utc::now())));
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
        }
        Command::Import { path } => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let count = ctx.admin().import(&json).context("Import failed")?;
            println!("Imported {} lanes", count);
        }
        Command::Reset { yes } => {
            if !yes {
                bail!("Refusing to reset without --yes");
            }
            ctx.admin().reset()?;
            println!("Configuration reset");
        }
        Command::TestConnection => {
            let status = ctx.admin().test_connection().await;
            println!("{}", status);
            if !status.is_healthy() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn set_enabled(ctx: &App, lane: &str, enabled: bool) -> Result<()> {
    if !ctx.config.set_enabled(&LaneKey::new(lane), enabled)? {
        bail!("No lane configured as {:?}", lane);
    }
    println!("{} {}", lane, if enabled { "enabled" } else { "disabled" });
    Ok(())
}

async fn replay(ctx: &App, path: &Path) -> Result<()> {
    let capture =
        Capture::load(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let stats = capture.stats();
    tracing::info!(
        "Loaded capture: {} records, {} malformed lines",
        stats.records,
        stats.malformed
    );

    let pipeline = PostPipeline::new(
        ctx.config.clone(),
        ctx.ledger.clone(),
        Arc::clone(&ctx.delivery),
    );
    let queue = IngestionQueue::new(ctx.settings.queue(), ctx.ledger.clone(), Arc::new(pipeline));

    let page = Arc::new(MemoryPage::new());
    capture.render_lanes(&page);

    // The in-memory page is rendered up front.
    let discovery_config = DiscoveryConfig {
        poll_interval: Duration::from_millis(100),
        settle_delay: Duration::ZERO,
        ..DiscoveryConfig::default()
    };
    let discovery = LaneDiscovery::new(
        page.clone(),
        ctx.config.clone(),
        queue.clone(),
        discovery_config,
    );
    let watched = discovery.start().await.context("Lane discovery failed")?;
    if watched == 0 {
        tracing::warn!("No captured lane is configured and enabled; nothing will be relayed");
    }
    gauge!("relay_running").set(1.0);

    capture.play(&page);
    // Give the watchers a moment to forward what was appended.
    tokio::time::sleep(Duration::from_millis(250)).await;

    tokio::select! {
        _ = queue.wait_idle(Duration::from_millis(250)) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received; {} posts left in queue", queue.pending_len());
        }
    }

    discovery.shutdown();
    gauge!("relay_running").set(0.0);

    tracing::info!("═══════════════════════════════════════════════════════");
    tracing::info!("REPLAY COMPLETE");
    tracing::info!("═══════════════════════════════════════════════════════");
    for line in ctx.admin().summary().to_string().lines() {
        tracing::info!("{}", line);
    }

    Ok(())
}
