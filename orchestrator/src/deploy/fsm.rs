//! Finite State Machine for project deployments

use std::time::Duration;

use crate::models::project::ProjectStatus;
use crate::utils::CooldownOptions;

/// Background monitor settings
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Delay between two status polls
    pub poll_interval: Duration,

    /// Maximum time a single attempt may stay in a non-terminal remote state
    pub max_wait: Duration,

    /// Delay schedule between resubmissions
    pub retry_backoff: CooldownOptions,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_wait: Duration::from_secs(15 * 60),
            retry_backoff: CooldownOptions {
                base_delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(120),
                multiplier: 2.0,
            },
        }
    }
}

/// Deployment event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentEvent {
    /// The provider accepted a deployment
    Accept { deployment_id: String },

    /// The remote build is live
    Ready { url: String },

    /// A retryable failure was observed
    Retry,

    /// Deployment failed, was canceled, or was rejected
    Fail(String),

    /// Maintenance reset of a failed project
    Reset,
}

/// Compute the status reached from `current` on `event`.
///
/// `Accept` and `Fail` are valid from every status; the others only from the
/// status that produces them.
pub fn next_status(
    current: ProjectStatus,
    event: &DeploymentEvent,
) -> Result<ProjectStatus, String> {
    let next = match (current, event) {
        (_, DeploymentEvent::Accept { .. }) => ProjectStatus::Deploying,
        (_, DeploymentEvent::Fail(_)) => ProjectStatus::Failed,

        (ProjectStatus::Deploying, DeploymentEvent::Ready { .. }) => ProjectStatus::Deployed,
        (ProjectStatus::Deploying | ProjectStatus::Retrying, DeploymentEvent::Retry) => {
            ProjectStatus::Retrying
        }
        (ProjectStatus::Failed, DeploymentEvent::Reset) => ProjectStatus::Pending,

        (state, event) => {
            return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
        }
    };
    Ok(next)
}

/// Deployment FSM tracking one project's status and attempt count
#[derive(Debug, Clone)]
pub struct DeploymentFsm {
    state: ProjectStatus,
    error: Option<String>,
    retry_count: u32,
}

impl DeploymentFsm {
    /// Create a new FSM at `state`
    pub fn new(state: ProjectStatus) -> Self {
        Self {
            state,
            error: None,
            retry_count: 0,
        }
    }

    /// Get current state
    pub fn state(&self) -> ProjectStatus {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of resubmissions so far
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeploymentEvent) -> Result<(), String> {
        let new_state = next_status(self.state, &event)?;

        match event {
            DeploymentEvent::Accept { .. } | DeploymentEvent::Ready { .. } => self.error = None,
            DeploymentEvent::Retry => self.retry_count += 1,
            DeploymentEvent::Fail(err) => self.error = Some(err),
            DeploymentEvent::Reset => {
                self.error = None;
                self.retry_count = 0;
            }
        }

        self.state = new_state;
        Ok(())
    }
}

impl Default for DeploymentFsm {
    fn default() -> Self {
        Self::new(ProjectStatus::Draft)
    }
}
