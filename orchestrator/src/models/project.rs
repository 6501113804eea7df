//! Project models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Deployment status of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    /// Generated, never deployed
    Draft,

    /// A remote deployment has been accepted and is building
    Deploying,

    /// The remote deployment is live
    Deployed,

    /// The last deployment failed or was canceled
    Failed,

    /// A retryable failure was observed and a resubmission is pending
    Retrying,

    /// Reset by maintenance, ready to be deployed again
    Pending,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Deploying => "deploying",
            ProjectStatus::Deployed => "deployed",
            ProjectStatus::Failed => "failed",
            ProjectStatus::Retrying => "retrying",
            ProjectStatus::Pending => "pending",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated project as persisted by the project store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Project ID
    pub id: String,

    /// Owner user ID
    pub user_id: String,

    /// Display name
    pub name: String,

    /// Reference to the generated source; absent until generation ran
    #[serde(default)]
    pub repository: Option<String>,

    /// Current deployment status
    pub status: ProjectStatus,

    /// Live URL, only set while `status` is `deployed`
    #[serde(default)]
    pub deployment_url: Option<String>,

    /// Provider ID of the current deployment attempt
    #[serde(default)]
    pub deployment_id: Option<String>,

    /// Last status change
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a new draft project
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            name: name.into(),
            repository: None,
            status: ProjectStatus::Draft,
            deployment_url: None,
            deployment_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Attach the generated source reference
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    /// Check whether the project belongs to a user
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}
