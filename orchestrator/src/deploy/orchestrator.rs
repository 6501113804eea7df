//! Public entry point for deployment operations

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::deploy::fsm::{DeploymentEvent, MonitorSettings};
use crate::deploy::monitor::Monitor;
use crate::deploy::registry::{MonitorRegistry, MonitorSlot};
use crate::deploy::retry::classify;
use crate::deploy::submit;
use crate::errors::OrchestratorError;
use crate::models::deployment::{DeploymentContext, DeploymentStatus, Outcome};
use crate::models::project::{Project, ProjectStatus};
use crate::provider::ProviderClient;
use crate::store::{Precondition, ProjectStore, ProjectUpdate};

pub const NO_DEPLOYMENT_IN_PROGRESS: &str = "No deployment in progress to cancel";
pub const PROJECT_NOT_GENERATED: &str = "Project must be generated before deployment";
pub const DEPLOYMENT_IN_PROGRESS: &str = "Deployment already in progress";
pub const PROJECT_NOT_FOUND: &str = "Project not found";
pub const DEPLOYMENT_NOT_RECORDED: &str = "Deployment could not be recorded";

/// Age after which failed deployments are reset by cleanup
pub const DEFAULT_CLEANUP_DAYS: u32 = 7;

/// Composes the provider, the project store and the background monitors
pub struct Orchestrator {
    provider: Arc<dyn ProviderClient>,
    store: Arc<dyn ProjectStore>,
    registry: Arc<MonitorRegistry>,
    settings: MonitorSettings,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ProviderClient>,
        store: Arc<dyn ProjectStore>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            provider,
            store,
            registry: Arc::new(MonitorRegistry::new()),
            settings,
        }
    }

    /// Registry of live monitors
    pub fn registry(&self) -> &Arc<MonitorRegistry> {
        &self.registry
    }

    /// Submit a deployment and start monitoring it in the background.
    ///
    /// Returns as soon as the provider accepted or rejected the request.
    pub async fn start_deployment(&self, ctx: DeploymentContext) -> Outcome {
        let Some(source_repo) = ctx.source_repo.clone() else {
            return Outcome::failure(PROJECT_NOT_GENERATED, false);
        };
        if let Err(outcome) = self.owned_project(&ctx.project_id, &ctx.user_id).await {
            return outcome;
        }
        let Some(slot) = self.registry.reserve(&ctx.project_id) else {
            return Outcome::failure(DEPLOYMENT_IN_PROGRESS, false);
        };

        self.launch(ctx, source_repo, slot).await
    }

    /// Re-attempt a deployment for a previously generated project
    pub async fn retry_deployment(&self, ctx: DeploymentContext) -> Outcome {
        let project = match self.owned_project(&ctx.project_id, &ctx.user_id).await {
            Ok(project) => project,
            Err(outcome) => return outcome,
        };

        let Some(repository) = project.repository else {
            return Outcome::failure(PROJECT_NOT_GENERATED, false);
        };
        let source_repo = ctx.source_repo.clone().unwrap_or(repository);

        let Some(slot) = self.registry.reserve(&ctx.project_id) else {
            return Outcome::failure(DEPLOYMENT_IN_PROGRESS, false);
        };

        info!(
            "Retrying deployment of {} (previous status {})",
            ctx.project_id, project.status
        );
        self.launch(ctx, source_repo, slot).await
    }

    /// Load a project owned by `user_id`, or the failure to hand back
    async fn owned_project(&self, project_id: &str, user_id: &str) -> Result<Project, Outcome> {
        match self.store.find_project(project_id, user_id).await {
            Ok(Some(project)) => Ok(project),
            Ok(None) => Err(Outcome::failure(PROJECT_NOT_FOUND, false)),
            Err(e) => {
                error!("Failed to load project {}: {}", project_id, e);
                Err(Outcome::failure(e.to_string(), false))
            }
        }
    }

    async fn launch(&self, ctx: DeploymentContext, source_repo: String, slot: MonitorSlot) -> Outcome {
        info!(
            "Submitting deployment of {} as {}",
            ctx.project_id, ctx.target_name
        );

        let descriptor = match submit(self.provider.as_ref(), &ctx, &source_repo).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                let retryable = classify(&e);
                warn!(
                    "Provider rejected deployment of {} (retryable: {}): {}",
                    ctx.project_id, retryable, e
                );
                let update = ProjectUpdate::new(DeploymentEvent::Fail(e.to_string()));
                if let Err(store_err) = self.store.update_project(&ctx.project_id, update).await {
                    error!(
                        "Failed to record rejected deployment of {}: {}",
                        ctx.project_id, store_err
                    );
                }
                return Outcome::failure(e.message(), retryable);
            }
        };

        let accept = ProjectUpdate::new(DeploymentEvent::Accept {
            deployment_id: descriptor.id.clone(),
        });
        match self.store.update_project(&ctx.project_id, accept).await {
            Ok(true) => {}
            Ok(false) => {
                error!(
                    "Project {} refused deployment {}",
                    ctx.project_id, descriptor.id
                );
                return Outcome::failure(DEPLOYMENT_NOT_RECORDED, false);
            }
            Err(e) => {
                error!(
                    "Failed to record deployment {} of {}: {}",
                    descriptor.id, ctx.project_id, e
                );
                return Outcome::failure(e.to_string(), false);
            }
        }

        info!(
            "Deployment {} accepted for {}",
            descriptor.id, ctx.project_id
        );
        let outcome = Outcome::accepted(&descriptor);

        Monitor::new(
            ctx,
            source_repo,
            descriptor.id,
            slot,
            self.provider.clone(),
            self.store.clone(),
            self.settings.clone(),
        )
        .spawn();

        outcome
    }

    /// Cancel the in-flight deployment of a project.
    ///
    /// The provider's build is not stopped; the project is marked failed, its
    /// monitor stops at its next tick and the project can be redeployed at once.
    pub async fn cancel_deployment(&self, project_id: &str, user_id: &str) -> Outcome {
        let project = match self.owned_project(project_id, user_id).await {
            Ok(project) => project,
            Err(outcome) => return outcome,
        };

        if project.status != ProjectStatus::Deploying {
            return Outcome::failure(NO_DEPLOYMENT_IN_PROGRESS, false);
        }

        let update = ProjectUpdate::new(DeploymentEvent::Fail(
            "Deployment canceled by user".to_string(),
        ))
        .when(Precondition::Status(ProjectStatus::Deploying));

        match self.store.update_project(project_id, update).await {
            Ok(true) => {
                let signalled = self.registry.cancel(project_id);
                info!(
                    "Canceled deployment of {} (monitor signalled: {})",
                    project_id, signalled
                );
                Outcome::ok()
            }
            Ok(false) => Outcome::failure(NO_DEPLOYMENT_IN_PROGRESS, false),
            Err(e) => {
                error!("Failed to cancel deployment of {}: {}", project_id, e);
                Outcome::failure(e.to_string(), false)
            }
        }
    }

    /// Current deployment status of a project owned by `user_id`
    pub async fn get_deployment_status(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<DeploymentStatus, OrchestratorError> {
        let project = self
            .store
            .find_project(project_id, user_id)
            .await?
            .ok_or_else(|| OrchestratorError::ProjectNotFound(project_id.to_string()))?;

        Ok(DeploymentStatus {
            status: project.status,
            deployment_url: project.deployment_url,
            last_updated: project.updated_at,
        })
    }

    /// Reset failed projects older than `days` to pending.
    ///
    /// Never fails: store errors are logged and reported as zero.
    pub async fn cleanup_failed_deployments(&self, days: Option<u32>) -> u64 {
        let days = days.unwrap_or(DEFAULT_CLEANUP_DAYS);
        let Some(cutoff) = Utc::now().checked_sub_signed(chrono::Duration::days(i64::from(days)))
        else {
            return 0;
        };

        match self.store.bulk_reset_failed(cutoff).await {
            Ok(count) => {
                info!("Reset {} failed deployments older than {} days", count, days);
                count
            }
            Err(e) => {
                error!("Failed deployment cleanup failed: {}", e);
                0
            }
        }
    }

    /// Mark `deploying` projects without a live monitor as failed once they
    /// have not changed for `older_than`.
    ///
    /// Never fails: store errors are logged and reported as zero.
    pub async fn cleanup_stale_deployments(&self, older_than: Duration) -> u64 {
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            return 0;
        };

        let live = self.registry.active_projects();
        match self.store.bulk_fail_stale_deploying(cutoff, &live).await {
            Ok(count) => {
                if count > 0 {
                    warn!("Marked {} orphaned deployments as failed", count);
                }
                count
            }
            Err(e) => {
                error!("Stale deployment cleanup failed: {}", e);
                0
            }
        }
    }
}
