//! Shared test doubles

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;

use deployd::deploy::fsm::MonitorSettings;
use deployd::deploy::orchestrator::Orchestrator;
use deployd::errors::{ProviderError, StoreError};
use deployd::models::deployment::{DeploymentContext, DeploymentDescriptor, RemoteState};
use deployd::models::project::Project;
use deployd::provider::ProviderClient;
use deployd::store::memory::MemoryProjectStore;
use deployd::store::{ProjectStore, ProjectUpdate};
use deployd::utils::CooldownOptions;

pub type Scripted = Result<DeploymentDescriptor, ProviderError>;

pub fn descriptor(id: &str, remote_state: RemoteState) -> DeploymentDescriptor {
    DeploymentDescriptor {
        id: id.to_string(),
        url: format!("{}.host", id),
        remote_state,
        inspector_url: None,
        error_message: None,
    }
}

pub fn failed_descriptor(id: &str, message: &str) -> DeploymentDescriptor {
    DeploymentDescriptor {
        error_message: Some(message.to_string()),
        ..descriptor(id, RemoteState::Error)
    }
}

/// Provider replaying scripted responses.
///
/// `create_deployment` pops the next scripted result. Status polls pop from a
/// per-deployment queue whose last entry repeats forever; unscripted
/// deployments keep building.
#[derive(Default)]
pub struct ScriptedProvider {
    creates: Mutex<VecDeque<Scripted>>,
    statuses: Mutex<HashMap<String, VecDeque<Scripted>>>,
    create_calls: AtomicUsize,
    status_calls: AtomicUsize,
    submitted_sources: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(self, result: Scripted) -> Self {
        self.creates.lock().unwrap().push_back(result);
        self
    }

    pub fn on_status(self, deployment_id: &str, results: Vec<Scripted>) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(deployment_id.to_string(), results.into());
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn submitted_sources(&self) -> Vec<String> {
        self.submitted_sources.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn create_deployment(
        &self,
        _token: &SecretString,
        _target_name: &str,
        source_repo: &str,
        _production: bool,
    ) -> Result<DeploymentDescriptor, ProviderError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.submitted_sources
            .lock()
            .unwrap()
            .push(source_repo.to_string());
        self.creates
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Rejected("unscripted create".to_string())))
    }

    async fn get_deployment_status(
        &self,
        _token: &SecretString,
        deployment_id: &str,
    ) -> Result<DeploymentDescriptor, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        match statuses.get_mut(deployment_id) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Ok(descriptor(deployment_id, RemoteState::Building)),
        }
    }
}

/// Store whose every call fails
pub struct FailingStore;

#[async_trait]
impl ProjectStore for FailingStore {
    async fn find_project(&self, _: &str, _: &str) -> Result<Option<Project>, StoreError> {
        Err(StoreError::Corrupt("store offline".to_string()))
    }

    async fn update_project(&self, _: &str, _: ProjectUpdate) -> Result<bool, StoreError> {
        Err(StoreError::Corrupt("store offline".to_string()))
    }

    async fn bulk_reset_failed(&self, _: DateTime<Utc>) -> Result<u64, StoreError> {
        Err(StoreError::Corrupt("store offline".to_string()))
    }

    async fn bulk_fail_stale_deploying(
        &self,
        _: DateTime<Utc>,
        _: &[String],
    ) -> Result<u64, StoreError> {
        Err(StoreError::Corrupt("store offline".to_string()))
    }
}

/// Store that finds its project but refuses every update
pub struct RefusingStore {
    pub project: Project,
}

#[async_trait]
impl ProjectStore for RefusingStore {
    async fn find_project(&self, _: &str, _: &str) -> Result<Option<Project>, StoreError> {
        Ok(Some(self.project.clone()))
    }

    async fn update_project(&self, _: &str, _: ProjectUpdate) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn bulk_reset_failed(&self, _: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(0)
    }

    async fn bulk_fail_stale_deploying(
        &self,
        _: DateTime<Utc>,
        _: &[String],
    ) -> Result<u64, StoreError> {
        Ok(0)
    }
}

/// Monitor settings fast enough for tests
pub fn fast_settings() -> MonitorSettings {
    MonitorSettings {
        poll_interval: Duration::from_millis(10),
        max_wait: Duration::from_secs(5),
        retry_backoff: CooldownOptions {
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            multiplier: 2.0,
        },
    }
}

pub fn orchestrator(
    provider: Arc<ScriptedProvider>,
    store: Arc<MemoryProjectStore>,
    settings: MonitorSettings,
) -> Orchestrator {
    Orchestrator::new(provider, store, settings)
}

pub fn context(project_id: &str) -> DeploymentContext {
    DeploymentContext::new(
        project_id,
        "u1",
        SecretString::from("vercel-token".to_string()),
        "My Shop",
    )
}

pub fn generated_project(project_id: &str) -> Project {
    Project::new(project_id, "u1", "My Shop").with_repository("acme/shop")
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
