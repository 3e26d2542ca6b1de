use crate::config::Config;
use recon_agent::MissionRunner;
use recon_llm::LlmClient;
use recon_memory::{DocumentStore, RagService};
use recon_persist::PersistClient;
use std::sync::Arc;

/// Shared application state passed to all handlers.
///
/// The gateway, vector store and runner are process-wide singletons built
/// once at startup; everything here is cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub persist: PersistClient,
    pub llm: Arc<dyn LlmClient>,
    pub store: Arc<DocumentStore>,
    pub rag: Arc<RagService>,
    pub runner: MissionRunner,
}

impl AppState {
    pub fn new(
        config: Config,
        persist: PersistClient,
        llm: Arc<dyn LlmClient>,
        store: Arc<DocumentStore>,
        rag: Arc<RagService>,
        runner: MissionRunner,
    ) -> Self {
        Self {
            config: Arc::new(config),
            persist,
            llm,
            store,
            rag,
            runner,
        }
    }
}
