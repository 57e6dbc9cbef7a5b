// src/lib.rs
// Public library surface for the binary and the integration tests.

pub mod api;
pub mod audit;
pub mod catalog;
pub mod credibility;
pub mod dedup;
pub mod event;
pub mod ingest;
pub mod metrics;
pub mod moderation;
pub mod notify;
pub mod pipeline;
pub mod quality;
pub mod relevance;
pub mod synthesize;

pub use crate::api::router;
pub use crate::event::{Event, EventSource, EventStatus};
pub use crate::notify::{ModerationNotice, NotifierMux};

use std::sync::Arc;

use crate::api::AppState;
use crate::audit::AuditLog;
use crate::catalog::{CatalogStore, InMemoryCatalog};
use crate::credibility::CredibilityTable;
use crate::ingest::config::load_discovery_default;
use crate::ingest::providers::providers_from_config;
use crate::ingest::scheduler::DiscoveryJob;
use crate::moderation::Moderator;
use crate::pipeline::Pipeline;
use crate::relevance::{start_hot_reload_thread, taxonomy_path, Taxonomy, TaxonomyHandle};

/// Everything the binary serves, wired from `config/` and env.
pub struct App {
    pub state: AppState,
    pub discovery: DiscoveryJob,
}

impl App {
    pub fn from_env() -> anyhow::Result<Self> {
        let taxonomy = TaxonomyHandle::new(Taxonomy::from_toml()?);
        start_hot_reload_thread(taxonomy.clone(), taxonomy_path());

        let credibility = Arc::new(CredibilityTable::load_default());
        let store: Arc<dyn CatalogStore> = Arc::new(InMemoryCatalog::new());
        let notifier = Arc::new(NotifierMux::from_env());
        if notifier.is_empty() {
            tracing::info!(target: "notify", "no notification sinks configured");
        }

        let moderator = Arc::new(
            Moderator::new(store.clone(), Arc::new(AuditLog::default()))
                .with_notifier(notifier.clone()),
        );
        let pipeline = Pipeline::new(taxonomy, credibility, store);

        let cfg = load_discovery_default()?;
        let providers = Arc::new(providers_from_config(&cfg));
        tracing::info!(target: "discovery", sources = providers.len(), "discovery configured");

        Ok(Self {
            state: AppState::new(pipeline.clone(), moderator.clone()),
            discovery: DiscoveryJob {
                cfg,
                providers,
                pipeline,
                moderator,
                notifier: Some(notifier),
            },
        })
    }
}
