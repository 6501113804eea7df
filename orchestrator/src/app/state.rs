//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::fsm::MonitorSettings;
use crate::deploy::orchestrator::Orchestrator;
use crate::errors::OrchestratorError;
use crate::provider::vercel::VercelClient;
use crate::provider::ProviderClient;
use crate::store::file::FileProjectStore;
use crate::store::ProjectStore;

/// Main application state
pub struct AppState {
    /// Deployment operations
    pub orchestrator: Arc<Orchestrator>,

    /// Retry budget applied when a request does not carry one
    pub default_max_retries: u32,
}

impl AppState {
    /// Initialize application state
    pub async fn init(options: &AppOptions) -> Result<Self, OrchestratorError> {
        info!("Initializing application state...");

        options.layout.setup().await?;

        let provider: Arc<dyn ProviderClient> = Arc::new(
            VercelClient::new(&options.provider.base_url, options.provider.request_timeout)?
                .with_team_id(options.provider.team_id.clone()),
        );
        let store: Arc<dyn ProjectStore> =
            Arc::new(FileProjectStore::new(options.layout.projects_file()));

        Ok(Self::new(
            provider,
            store,
            options.monitor.clone(),
            options.default_max_retries,
        ))
    }

    /// Assemble state from already built adapters
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        store: Arc<dyn ProjectStore>,
        monitor: MonitorSettings,
        default_max_retries: u32,
    ) -> Self {
        Self {
            orchestrator: Arc::new(Orchestrator::new(provider, store, monitor)),
            default_max_retries,
        }
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), OrchestratorError> {
        let live = self.orchestrator.registry().active_projects();
        if !live.is_empty() {
            // Interrupted monitors leave `deploying` rows for the stale
            // reconciliation of the next run.
            info!("Abandoning {} live deployment monitors", live.len());
        }
        Ok(())
    }
}
