//! Deployment models

use chrono::{DateTime, Utc};
use secrecy::SecretString;

use crate::models::project::ProjectStatus;

/// Default number of automatic resubmissions
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Longest target name the provider accepts
const MAX_TARGET_NAME_LEN: usize = 100;

/// Input to a deployment operation
#[derive(Debug)]
pub struct DeploymentContext {
    /// Project ID
    pub project_id: String,

    /// Owner; authorised by the caller, not re-checked here
    pub user_id: String,

    /// Provider credential
    pub provider_token: SecretString,

    /// Name of the remote project
    pub target_name: String,

    /// Reference to the code to deploy
    pub source_repo: Option<String>,

    /// Retry budget for the background monitor
    pub max_retries: u32,
}

impl DeploymentContext {
    pub fn new(
        project_id: impl Into<String>,
        user_id: impl Into<String>,
        provider_token: SecretString,
        target_name: &str,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            user_id: user_id.into(),
            provider_token,
            target_name: slugify(target_name),
            source_repo: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_source_repo(mut self, source_repo: impl Into<String>) -> Self {
        self.source_repo = Some(source_repo.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Derive a provider-safe project slug from a display name.
///
/// Lowercases, maps runs of anything outside `[a-z0-9]` to a single `-` and
/// trims dashes from both ends.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.truncate(MAX_TARGET_NAME_LEN);
    slug.trim_end_matches('-').to_string()
}

/// Remote build state of a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteState {
    Building,
    Ready,
    Error,
    Canceled,
}

impl RemoteState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RemoteState::Building)
    }
}

/// The provider's view of one deployment attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentDescriptor {
    /// Provider deployment ID
    pub id: String,

    /// Bare host, without scheme
    pub url: String,

    pub remote_state: RemoteState,

    /// Provider diagnostics link
    pub inspector_url: Option<String>,

    /// Provider failure message for `Error` states
    pub error_message: Option<String>,
}

impl DeploymentDescriptor {
    /// Fully-qualified deployment URL
    pub fn https_url(&self) -> String {
        format!("https://{}", self.url)
    }
}

/// Result of `start`, `retry` and `cancel`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub success: bool,
    pub deployment_id: Option<String>,
    pub deployment_url: Option<String>,
    pub error: Option<String>,

    /// Whether the orchestrator itself keeps retrying; only set on failure
    pub retryable: Option<bool>,
}

impl Outcome {
    /// A deployment was accepted by the provider
    pub fn accepted(descriptor: &DeploymentDescriptor) -> Self {
        Self {
            success: true,
            deployment_id: Some(descriptor.id.clone()),
            deployment_url: Some(descriptor.https_url()),
            error: None,
            retryable: None,
        }
    }

    /// An operation succeeded without producing a deployment
    pub fn ok() -> Self {
        Self {
            success: true,
            deployment_id: None,
            deployment_url: None,
            error: None,
            retryable: None,
        }
    }

    pub fn failure(error: impl Into<String>, retryable: bool) -> Self {
        Self {
            success: false,
            deployment_id: None,
            deployment_url: None,
            error: Some(error.into()),
            retryable: Some(retryable),
        }
    }
}

impl From<Outcome> for api_models::models::DeploymentOutcome {
    fn from(outcome: Outcome) -> Self {
        Self {
            success: outcome.success,
            deployment_id: outcome.deployment_id,
            deployment_url: outcome.deployment_url,
            error: outcome.error,
            retryable: outcome.retryable,
        }
    }
}

/// Deployment status of a project, as reported to callers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentStatus {
    pub status: ProjectStatus,
    pub deployment_url: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl From<DeploymentStatus> for api_models::models::DeploymentStatusResponse {
    fn from(status: DeploymentStatus) -> Self {
        Self {
            status: status.status.to_string(),
            deployment_url: status.deployment_url,
            last_updated: status.last_updated,
        }
    }
}
