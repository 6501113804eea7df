//! JSON file-backed project store

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::StoreError;
use crate::filesys::file::File;
use crate::models::project::{Project, ProjectStatus};
use crate::store::{apply_bulk, reset_update, stale_deploying_update, ProjectStore, ProjectUpdate};

/// On-disk layout of the projects file
#[derive(Debug, Default, Serialize, Deserialize)]
struct ProjectsDocument {
    #[serde(default)]
    projects: BTreeMap<String, Project>,
}

/// Project store persisting every project in one JSON document.
///
/// Each operation is a read-modify-write of the whole file under `lock`,
/// so a write never interleaves with another one from this process.
pub struct FileProjectStore {
    file: File,
    lock: Mutex<()>,
}

impl FileProjectStore {
    pub fn new(file: File) -> Self {
        Self {
            file,
            lock: Mutex::new(()),
        }
    }

    /// Insert or replace a project
    pub async fn insert(&self, project: Project) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;
        document.projects.insert(project.id.clone(), project);
        self.save(&document).await
    }

    /// List all projects
    pub async fn list(&self) -> Result<Vec<Project>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.projects.into_values().collect())
    }

    async fn load(&self) -> Result<ProjectsDocument, StoreError> {
        Ok(self
            .file
            .read_json_opt::<ProjectsDocument>()
            .await?
            .unwrap_or_default())
    }

    async fn save(&self, document: &ProjectsDocument) -> Result<(), StoreError> {
        self.file.write_json(document).await?;
        debug!("Saved {} projects to {:?}", document.projects.len(), self.file.path());
        Ok(())
    }

    async fn bulk_update<F>(&self, filter: F, update: ProjectUpdate) -> Result<u64, StoreError>
    where
        F: Fn(&Project) -> bool + Send,
    {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;
        let count = apply_bulk(document.projects.values_mut(), filter, &update, Utc::now());
        if count > 0 {
            self.save(&document).await?;
        }
        Ok(count)
    }
}

#[async_trait]
impl ProjectStore for FileProjectStore {
    async fn find_project(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<Project>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;
        Ok(document
            .projects
            .remove(project_id)
            .filter(|p| p.is_owned_by(user_id)))
    }

    async fn update_project(
        &self,
        project_id: &str,
        update: ProjectUpdate,
    ) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.load().await?;
        let project = document
            .projects
            .get_mut(project_id)
            .ok_or_else(|| StoreError::ProjectNotFound(project_id.to_string()))?;

        if !update.apply(project, Utc::now()) {
            return Ok(false);
        }
        self.save(&document).await?;
        Ok(true)
    }

    async fn bulk_reset_failed(&self, older_than: DateTime<Utc>) -> Result<u64, StoreError> {
        self.bulk_update(
            move |p| p.status == ProjectStatus::Failed && p.updated_at < older_than,
            reset_update(),
        )
        .await
    }

    async fn bulk_fail_stale_deploying(
        &self,
        older_than: DateTime<Utc>,
        exclude: &[String],
    ) -> Result<u64, StoreError> {
        self.bulk_update(
            |p| {
                p.status == ProjectStatus::Deploying
                    && p.updated_at < older_than
                    && !exclude.contains(&p.id)
            },
            stale_deploying_update(),
        )
        .await
    }
}
