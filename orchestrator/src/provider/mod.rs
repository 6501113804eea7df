//! Hosting provider client

pub mod vercel;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::errors::ProviderError;
use crate::models::deployment::DeploymentDescriptor;

/// Remote calls against the hosting provider.
///
/// Implementations do not retry; that is the orchestrator's job.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Submit a new deployment of `source_repo` under `target_name`
    async fn create_deployment(
        &self,
        token: &SecretString,
        target_name: &str,
        source_repo: &str,
        production: bool,
    ) -> Result<DeploymentDescriptor, ProviderError>;

    /// Fetch the current state of a deployment
    async fn get_deployment_status(
        &self,
        token: &SecretString,
        deployment_id: &str,
    ) -> Result<DeploymentDescriptor, ProviderError>;
}
