//! Worker binary entry point: loads configuration, connects the store,
//! constructs the shared dependency set, and runs the dispatcher loop until
//! a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use jobforge_core::store::TaskStore;
use jobforge_enrichment::{CombinedReferenceLookup, HtmlFetchClient, HtmlFetchConfig, WikidataClient, WikipediaClient};
use jobforge_worker::deps::{ConfiguredSearch, Deps};
use jobforge_worker::store::PostgresStore;
use jobforge_worker::{ConfigLoader, Dispatcher, EventTap, StatusPublisher};
use openai_client::OpenAIClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Config Loader re-poll interval; the five blobs are read fresh from the
/// store this often so operators can change policy without a restart.
const CONFIG_RELOAD_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "jobforge-worker", about = "Job Finder Worker Core dispatcher")]
struct Cli {
    /// Identifies this process in task leases and logs; defaults to a fresh
    /// uuid so running several instances never collide.
    #[arg(long, env = "WORKER_ID")]
    worker_id: Option<String>,

    /// Postgres connection string; falls back to `DATABASE_URL`.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Overrides the stored `worker-settings.concurrency` for this process.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Drain whatever is currently claimable and exit instead of polling
    /// forever; useful for scripted runs and CI smoke tests.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,jobforge_worker=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let worker_id = cli.worker_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    tracing::info!(worker_id, "starting jobforge-worker");

    let store: Arc<dyn TaskStore> = Arc::new(
        PostgresStore::connect(&cli.database_url)
            .await
            .context("failed to connect to postgres store")?,
    );

    let (config_loader, config_rx) = ConfigLoader::init(store.clone())
        .await
        .context("failed to load initial config snapshot")?;
    tokio::spawn(config_loader.run(CONFIG_RELOAD_INTERVAL));

    let daily_search_cap = config_rx.borrow().worker_settings.daily_search_cap;
    let deps = Arc::new(Deps {
        store: store.clone(),
        reference_lookup: CombinedReferenceLookup {
            primary: WikipediaClient::new(),
            secondary: WikidataClient::new(),
        },
        search: jobforge_enrichment::BudgetedSearch::new(ConfiguredSearch::from_env(), daily_search_cap),
        html_client: HtmlFetchClient::new(HtmlFetchConfig::default()).context("failed to build html fetch client")?,
        ai: jobforge_ai::AgentManager::new(OpenAIClient::from_env().context("failed to build openai client")?),
        http: reqwest::Client::new(),
        events: EventTap::default(),
    });

    let (status, _status_rx) = StatusPublisher::new();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let dispatcher = Dispatcher::new(worker_id, deps, config_rx, status)
        .with_concurrency_override(cli.concurrency)
        .with_once(cli.once);
    let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_rx));

    if cli.once {
        let _ = dispatcher_handle.await;
        return Ok(());
    }

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutdown signal received, draining in-flight tasks");
    let _ = shutdown_tx.send(true);
    let _ = dispatcher_handle.await;

    Ok(())
}
