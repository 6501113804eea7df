//! Background deployment monitor
//!
//! One monitor runs per in-flight deployment. It polls the provider until
//! the build reaches a terminal state and drives the project's status to
//! `deployed` or `failed`, resubmitting retryable failures while the retry
//! budget lasts. Every status write is conditional on the attempt the
//! monitor is bound to, so a cancel or a newer attempt always wins.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::deploy::fsm::{DeploymentEvent, DeploymentFsm, MonitorSettings};
use crate::deploy::registry::MonitorSlot;
use crate::deploy::retry::{classify, is_transient_message, RetryPolicy};
use crate::deploy::submit;
use crate::errors::ProviderError;
use crate::models::deployment::{DeploymentContext, DeploymentDescriptor, RemoteState};
use crate::models::project::ProjectStatus;
use crate::provider::ProviderClient;
use crate::store::{Precondition, ProjectStore, ProjectUpdate};
use crate::utils::calc_exp_backoff;

/// Failure observed while watching a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
struct Failure {
    message: String,
    retryable: bool,
}

impl Failure {
    fn from_provider(error: &ProviderError) -> Self {
        Self {
            message: error.to_string(),
            retryable: classify(error),
        }
    }

    fn remote(descriptor: &DeploymentDescriptor) -> Self {
        match &descriptor.error_message {
            Some(message) => Self {
                message: message.clone(),
                retryable: is_transient_message(message),
            },
            None => Self {
                message: "Deployment failed on provider".to_string(),
                retryable: false,
            },
        }
    }

    fn timeout(max_wait: Duration) -> Self {
        Self {
            message: format!("Deployment timed out after {}s", max_wait.as_secs()),
            retryable: true,
        }
    }
}

enum PollOutcome {
    Ready(String),
    CanceledByProvider,
    Cancelled,
    Failed(Failure),
}

/// Watches one project's deployment until it settles
pub struct Monitor {
    ctx: Arc<DeploymentContext>,
    source_repo: String,
    deployment_id: String,
    fsm: DeploymentFsm,
    policy: RetryPolicy,
    provider: Arc<dyn ProviderClient>,
    store: Arc<dyn ProjectStore>,
    settings: MonitorSettings,
    slot: MonitorSlot,
}

impl Monitor {
    pub fn new(
        ctx: DeploymentContext,
        source_repo: String,
        deployment_id: String,
        slot: MonitorSlot,
        provider: Arc<dyn ProviderClient>,
        store: Arc<dyn ProjectStore>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            policy: RetryPolicy::new(ctx.max_retries),
            ctx: Arc::new(ctx),
            source_repo,
            deployment_id,
            fsm: DeploymentFsm::new(ProjectStatus::Deploying),
            provider,
            store,
            settings,
            slot,
        }
    }

    /// Run the monitor as a detached task
    pub fn spawn(self) -> JoinHandle<()> {
        let span = info_span!(
            "monitor",
            project_id = %self.ctx.project_id,
            monitor_id = %Uuid::new_v4(),
        );
        tokio::spawn(self.run().instrument(span))
    }

    pub async fn run(mut self) {
        info!("Monitoring deployment {}", self.deployment_id);

        loop {
            let failure = match self.poll_until_terminal().await {
                PollOutcome::Ready(url) => {
                    let event = DeploymentEvent::Ready { url: url.clone() };
                    if self.write(event, self.attempt()).await {
                        info!("Deployment {} is live at {}", self.deployment_id, url);
                    }
                    return;
                }
                PollOutcome::CanceledByProvider => {
                    warn!(
                        annotation = "provider_cancel",
                        "Deployment {} was canceled by the provider", self.deployment_id
                    );
                    let event =
                        DeploymentEvent::Fail("Deployment was canceled by the provider".to_string());
                    self.write(event, self.attempt()).await;
                    return;
                }
                PollOutcome::Cancelled => {
                    info!(
                        annotation = "user_cancel",
                        "Deployment {} was canceled, monitor stopping", self.deployment_id
                    );
                    return;
                }
                PollOutcome::Failed(failure) => failure,
            };

            if !self.recover(failure).await {
                return;
            }
        }
    }

    fn attempt(&self) -> Precondition {
        Precondition::Attempt(self.deployment_id.clone())
    }

    async fn poll_until_terminal(&mut self) -> PollOutcome {
        let deadline = Instant::now() + self.settings.max_wait;

        loop {
            if self.sleep_or_cancel(self.settings.poll_interval).await {
                return PollOutcome::Cancelled;
            }

            let descriptor = match self
                .provider
                .get_deployment_status(&self.ctx.provider_token, &self.deployment_id)
                .await
            {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!("Polling deployment {} failed: {}", self.deployment_id, e);
                    return PollOutcome::Failed(Failure::from_provider(&e));
                }
            };

            match descriptor.remote_state {
                RemoteState::Ready => return PollOutcome::Ready(descriptor.https_url()),
                RemoteState::Error => return PollOutcome::Failed(Failure::remote(&descriptor)),
                RemoteState::Canceled => return PollOutcome::CanceledByProvider,
                RemoteState::Building => {
                    debug!("Deployment {} still building", self.deployment_id);
                }
            }

            if Instant::now() >= deadline {
                return PollOutcome::Failed(Failure::timeout(self.settings.max_wait));
            }
        }
    }

    /// Resubmit after a failure while the budget lasts. Returns `true` once
    /// the monitor is bound to a new accepted deployment.
    async fn recover(&mut self, mut failure: Failure) -> bool {
        let mut precondition = self.attempt();

        loop {
            if !self
                .policy
                .should_retry(failure.retryable, self.fsm.retry_count())
            {
                warn!(
                    "Deployment failed after {} retries: {}",
                    self.fsm.retry_count(),
                    failure.message
                );
                self.write(DeploymentEvent::Fail(failure.message), precondition)
                    .await;
                return false;
            }

            if self.fsm.state() == ProjectStatus::Deploying
                && !self.write(DeploymentEvent::Retry, precondition.clone()).await
            {
                return false;
            }
            precondition = Precondition::Status(ProjectStatus::Retrying);

            if let Err(e) = self.fsm.process(DeploymentEvent::Retry) {
                error!("Monitor state out of sync: {}", e);
                return false;
            }

            let attempt = self.fsm.retry_count();
            let delay = calc_exp_backoff(&self.settings.retry_backoff, attempt.saturating_sub(1));
            info!(
                "Retrying deployment (attempt {}/{}) in {:?}: {}",
                attempt, self.policy.max_retries, delay, failure.message
            );

            if self.sleep_or_cancel(delay).await {
                return false;
            }

            match submit(self.provider.as_ref(), &self.ctx, &self.source_repo).await {
                Ok(descriptor) => {
                    let accept = DeploymentEvent::Accept {
                        deployment_id: descriptor.id.clone(),
                    };
                    if !self.write(accept.clone(), precondition).await {
                        return false;
                    }
                    if let Err(e) = self.fsm.process(accept) {
                        error!("Monitor state out of sync: {}", e);
                        return false;
                    }

                    info!(
                        "Resubmitted as deployment {} ({})",
                        descriptor.id,
                        descriptor.https_url()
                    );
                    self.deployment_id = descriptor.id;
                    return true;
                }
                Err(e) => {
                    warn!("Resubmission failed: {}", e);
                    failure = Failure::from_provider(&e);
                }
            }
        }
    }

    /// Conditionally record an event; `false` means this monitor no longer
    /// owns the project and must stop
    async fn write(&self, event: DeploymentEvent, precondition: Precondition) -> bool {
        if self.slot.is_cancelled() {
            debug!("Cancellation observed, dropping {:?}", event);
            return false;
        }

        let update = ProjectUpdate::new(event).when(precondition);
        match self.store.update_project(&self.ctx.project_id, update).await {
            Ok(true) => true,
            Ok(false) => {
                info!(
                    "Project {} changed outside this monitor, stopping",
                    self.ctx.project_id
                );
                false
            }
            Err(e) => {
                error!(
                    "Failed to record deployment state for {}: {}",
                    self.ctx.project_id, e
                );
                false
            }
        }
    }

    /// Sleep for `wait`; returns `true` if cancelled meanwhile
    async fn sleep_or_cancel(&mut self, wait: Duration) -> bool {
        if self.slot.is_cancelled() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(wait) => false,
            _ = self.slot.cancelled() => true,
        }
    }
}
