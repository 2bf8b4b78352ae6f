//! Energy Portal: binary entrypoint.
//! Boots the Axum HTTP server: config, taxonomy, seeded in-memory store,
//! optional knowledge-base import and the Prometheus endpoint.

use std::sync::Arc;

use energy_portal::config::PortalConfig;
use energy_portal::ingest::{self, knowledge_base::KnowledgeBaseProvider, types::SourceProvider};
use energy_portal::metrics::Metrics;
use energy_portal::seed;
use energy_portal::store::MemoryStore;
use energy_portal::taxonomy::Taxonomy;
use energy_portal::{app, AppState, PortalService};
use shuttle_axum::ShuttleAxum;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENV_KNOWLEDGE_BASE_PATH: &str = "KNOWLEDGE_BASE_PATH";

/// Compact logs; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("energy_portal=info,warn"));

    // The runtime may already have installed a subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = PortalConfig::load_default().unwrap_or_else(|e| {
        warn!(error = ?e, "portal config unreadable, using built-in lists");
        PortalConfig::default()
    });
    let taxonomy = Taxonomy::load_default().unwrap_or_else(|e| {
        warn!(error = ?e, "taxonomy unreadable, using built-in dictionaries");
        Taxonomy::builtin().clone()
    });
    let taxonomy = Arc::new(taxonomy);

    let store = Arc::new(MemoryStore::new());
    let demo = seed::demo_dataset(chrono::Utc::now(), &taxonomy);
    let seeded = seed::load_into(store.as_ref(), demo)
        .await
        .map_err(anyhow::Error::from)?;
    info!(rows = seeded, "demo data loaded");

    if let Ok(path) = std::env::var(ENV_KNOWLEDGE_BASE_PATH) {
        let providers: Vec<Box<dyn SourceProvider>> =
            vec![Box::new(KnowledgeBaseProvider::from_path(path))];
        match ingest::run_once(&providers, store.as_ref(), &taxonomy).await {
            Ok(report) => info!(?report, "knowledge base imported"),
            Err(e) => warn!(error = ?e, "knowledge base import failed"),
        }
    }

    let metrics = Metrics::init()?;

    let portal = PortalService::in_memory(store, config, taxonomy);
    let router = app(AppState::new(portal)).merge(metrics.router());

    Ok(router.into())
}
