//! Project store

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::deploy::fsm::{next_status, DeploymentEvent};
use crate::errors::StoreError;
use crate::models::project::{Project, ProjectStatus};

/// Persistence boundary for project deployment state.
///
/// Writes are conditional so that the orchestrator and the background
/// monitors never need a shared lock.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Find a project owned by `user_id`
    async fn find_project(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<Project>, StoreError>;

    /// Apply an update; returns whether its precondition held
    async fn update_project(
        &self,
        project_id: &str,
        update: ProjectUpdate,
    ) -> Result<bool, StoreError>;

    /// Reset `failed` projects last updated before `older_than` to `pending`
    async fn bulk_reset_failed(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Fail `deploying` projects last updated before `older_than`, skipping
    /// the ones listed in `exclude`
    async fn bulk_fail_stale_deploying(
        &self,
        older_than: DateTime<Utc>,
        exclude: &[String],
    ) -> Result<u64, StoreError>;
}

/// What a conditional update expects to find
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// Unconditional
    Any,

    /// Status must equal the given one
    Status(ProjectStatus),

    /// Status must be `deploying` for exactly this deployment attempt
    Attempt(String),
}

impl Precondition {
    pub fn holds(&self, project: &Project) -> bool {
        match self {
            Precondition::Any => true,
            Precondition::Status(status) => project.status == *status,
            Precondition::Attempt(deployment_id) => {
                project.status == ProjectStatus::Deploying
                    && project.deployment_id.as_deref() == Some(deployment_id.as_str())
            }
        }
    }
}

/// A state machine event to apply to a stored project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectUpdate {
    pub event: DeploymentEvent,
    pub precondition: Precondition,
}

impl ProjectUpdate {
    pub fn new(event: DeploymentEvent) -> Self {
        Self {
            event,
            precondition: Precondition::Any,
        }
    }

    pub fn when(mut self, precondition: Precondition) -> Self {
        self.precondition = precondition;
        self
    }

    /// Apply to `project` if the precondition holds and the transition is
    /// valid. `deployment_url` is only ever set by a `Ready` event.
    pub fn apply(&self, project: &mut Project, now: DateTime<Utc>) -> bool {
        if !self.precondition.holds(project) {
            return false;
        }
        let Ok(status) = next_status(project.status, &self.event) else {
            return false;
        };

        match &self.event {
            DeploymentEvent::Accept { deployment_id } => {
                project.deployment_id = Some(deployment_id.clone());
                project.deployment_url = None;
            }
            DeploymentEvent::Ready { url } => project.deployment_url = Some(url.clone()),
            DeploymentEvent::Retry | DeploymentEvent::Fail(_) | DeploymentEvent::Reset => {
                project.deployment_url = None;
            }
        }

        project.status = status;
        project.updated_at = now;
        true
    }
}

/// Apply `update` to every project matching `filter`, returning the count
pub(crate) fn apply_bulk<'a>(
    projects: impl Iterator<Item = &'a mut Project>,
    filter: impl Fn(&Project) -> bool,
    update: &ProjectUpdate,
    now: DateTime<Utc>,
) -> u64 {
    let mut count = 0;
    for project in projects.filter(|p| filter(p)) {
        if update.apply(project, now) {
            count += 1;
        }
    }
    count
}

pub(crate) fn reset_update() -> ProjectUpdate {
    ProjectUpdate::new(DeploymentEvent::Reset)
}

pub(crate) fn stale_deploying_update() -> ProjectUpdate {
    ProjectUpdate::new(DeploymentEvent::Fail(
        "Deployment monitor lost; marked failed by maintenance".to_string(),
    ))
}
