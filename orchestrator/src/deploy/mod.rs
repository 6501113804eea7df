//! Deployment orchestration

pub mod fsm;
pub mod monitor;
pub mod orchestrator;
pub mod registry;
pub mod retry;

use crate::errors::ProviderError;
use crate::models::deployment::{DeploymentContext, DeploymentDescriptor};
use crate::provider::ProviderClient;

/// Submit a production deployment for `ctx`.
///
/// Both the first submission and the monitor's resubmissions go through here.
pub(crate) async fn submit(
    provider: &dyn ProviderClient,
    ctx: &DeploymentContext,
    source_repo: &str,
) -> Result<DeploymentDescriptor, ProviderError> {
    provider
        .create_deployment(&ctx.provider_token, &ctx.target_name, source_repo, true)
        .await
}
