//! In-memory project store

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::StoreError;
use crate::models::project::{Project, ProjectStatus};
use crate::store::{apply_bulk, reset_update, stale_deploying_update, ProjectStore, ProjectUpdate};

/// Project store backed by a map, for tests and ephemeral runs
#[derive(Default)]
pub struct MemoryProjectStore {
    projects: RwLock<HashMap<String, Project>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `projects`
    pub fn with_projects(projects: impl IntoIterator<Item = Project>) -> Self {
        let store = Self::new();
        for project in projects {
            store.insert(project);
        }
        store
    }

    /// Insert or replace a project
    pub fn insert(&self, project: Project) {
        let mut projects = self.projects.write().unwrap_or_else(|e| e.into_inner());
        projects.insert(project.id.clone(), project);
    }

    /// Get a project regardless of owner
    pub fn get(&self, project_id: &str) -> Option<Project> {
        let projects = self.projects.read().unwrap_or_else(|e| e.into_inner());
        projects.get(project_id).cloned()
    }

    pub fn len(&self) -> usize {
        let projects = self.projects.read().unwrap_or_else(|e| e.into_inner());
        projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn find_project(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<Project>, StoreError> {
        let projects = self.projects.read().unwrap_or_else(|e| e.into_inner());
        Ok(projects
            .get(project_id)
            .filter(|p| p.is_owned_by(user_id))
            .cloned())
    }

    async fn update_project(
        &self,
        project_id: &str,
        update: ProjectUpdate,
    ) -> Result<bool, StoreError> {
        let mut projects = self.projects.write().unwrap_or_else(|e| e.into_inner());
        let project = projects
            .get_mut(project_id)
            .ok_or_else(|| StoreError::ProjectNotFound(project_id.to_string()))?;
        Ok(update.apply(project, Utc::now()))
    }

    async fn bulk_reset_failed(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut projects = self.projects.write().unwrap_or_else(|e| e.into_inner());
        Ok(apply_bulk(
            projects.values_mut(),
            |p| p.status == ProjectStatus::Failed && p.updated_at < older_than,
            &reset_update(),
            Utc::now(),
        ))
    }

    async fn bulk_fail_stale_deploying(
        &self,
        older_than: DateTime<Utc>,
        exclude: &[String],
    ) -> Result<u64, StoreError> {
        let mut projects = self.projects.write().unwrap_or_else(|e| e.into_inner());
        Ok(apply_bulk(
            projects.values_mut(),
            |p| {
                p.status == ProjectStatus::Deploying
                    && p.updated_at < older_than
                    && !exclude.contains(&p.id)
            },
            &stale_deploying_update(),
            Utc::now(),
        ))
    }
}
