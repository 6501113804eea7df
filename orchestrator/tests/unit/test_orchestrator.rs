//! Orchestrator behaviour against a scripted provider

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_test::assert_ok;

use deployd::deploy::orchestrator::{
    Orchestrator, DEPLOYMENT_IN_PROGRESS, DEPLOYMENT_NOT_RECORDED, NO_DEPLOYMENT_IN_PROGRESS,
    PROJECT_NOT_FOUND, PROJECT_NOT_GENERATED,
};
use deployd::errors::{OrchestratorError, ProviderError};
use deployd::models::deployment::RemoteState;
use deployd::models::project::{Project, ProjectStatus};
use deployd::store::memory::MemoryProjectStore;

use crate::support::{
    context, descriptor, eventually, failed_descriptor, fast_settings, generated_project,
    orchestrator, FailingStore, RefusingStore, ScriptedProvider,
};

fn setup(
    provider: ScriptedProvider,
    projects: Vec<Project>,
) -> (Orchestrator, Arc<ScriptedProvider>, Arc<MemoryProjectStore>) {
    let provider = Arc::new(provider);
    let store = Arc::new(MemoryProjectStore::with_projects(projects));
    let orchestrator = orchestrator(provider.clone(), store.clone(), fast_settings());
    (orchestrator, provider, store)
}

fn status_of(store: &MemoryProjectStore, project_id: &str) -> ProjectStatus {
    store.get(project_id).map(|p| p.status).unwrap_or(ProjectStatus::Draft)
}

async fn settles_at(store: &MemoryProjectStore, project_id: &str, status: ProjectStatus) -> bool {
    eventually(move || async move { status_of(store, project_id) == status }).await
}

async fn monitor_released(orchestrator: &Orchestrator, project_id: &str) -> bool {
    eventually(move || async move { !orchestrator.registry().is_active(project_id) }).await
}

fn aged(mut project: Project, status: ProjectStatus, age: chrono::Duration) -> Project {
    project.status = status;
    project.updated_at = Utc::now() - age;
    project
}

// ================================= START ===================================== //

#[tokio::test]
async fn test_start_returns_accepted_descriptor() {
    let accepted = deployd::models::deployment::DeploymentDescriptor {
        url: "p-abc.host".to_string(),
        ..descriptor("d1", RemoteState::Building)
    };
    let (orchestrator, _provider, store) = setup(
        ScriptedProvider::new().on_create(Ok(accepted)),
        vec![generated_project("p1")],
    );

    let outcome = orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.deployment_id.as_deref(), Some("d1"));
    assert_eq!(outcome.deployment_url.as_deref(), Some("https://p-abc.host"));
    assert!(outcome.error.is_none());

    let project = store.get("p1").unwrap();
    assert_eq!(project.status, ProjectStatus::Deploying);
    assert_eq!(project.deployment_id.as_deref(), Some("d1"));
    assert!(orchestrator.registry().is_active("p1"));
}

#[tokio::test]
async fn test_start_rejected_by_provider() {
    let (orchestrator, _provider, store) = setup(
        ScriptedProvider::new().on_create(Err(ProviderError::Rejected(
            "Vercel API error".to_string(),
        ))),
        vec![generated_project("p1")],
    );

    let outcome = orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some("Vercel API error"));
    assert_eq!(outcome.retryable, Some(false));
    assert_eq!(status_of(&store, "p1"), ProjectStatus::Failed);
    assert!(!orchestrator.registry().is_active("p1"));
}

#[tokio::test]
async fn test_start_timeout_is_retryable() {
    let (orchestrator, _provider, store) = setup(
        ScriptedProvider::new().on_create(Err(ProviderError::Timeout(
            "Request timeout".to_string(),
        ))),
        vec![generated_project("p1")],
    );

    let outcome = orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.retryable, Some(true));
    assert_eq!(status_of(&store, "p1"), ProjectStatus::Failed);
}

#[tokio::test]
async fn test_start_without_source_never_calls_provider() {
    let (orchestrator, provider, _store) =
        setup(ScriptedProvider::new(), vec![generated_project("p1")]);

    let outcome = orchestrator.start_deployment(context("p1")).await;

    assert_eq!(outcome.error.as_deref(), Some(PROJECT_NOT_GENERATED));
    assert_eq!(provider.create_calls(), 0);
}

#[tokio::test]
async fn test_start_unknown_project_never_calls_provider() {
    let (orchestrator, provider, _store) = setup(
        ScriptedProvider::new().on_create(Ok(descriptor("d1", RemoteState::Building))),
        vec![],
    );

    let outcome = orchestrator
        .start_deployment(context("ghost").with_source_repo("acme/shop"))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some(PROJECT_NOT_FOUND));
    assert_eq!(outcome.retryable, Some(false));
    assert_eq!(provider.create_calls(), 0);
    assert!(!orchestrator.registry().is_active("ghost"));
}

#[tokio::test]
async fn test_start_checks_ownership() {
    let (orchestrator, provider, store) = setup(
        ScriptedProvider::new().on_create(Ok(descriptor("d1", RemoteState::Building))),
        vec![generated_project("p1")],
    );

    let mut ctx = context("p1").with_source_repo("acme/shop");
    ctx.user_id = "someone-else".to_string();
    let outcome = orchestrator.start_deployment(ctx).await;

    assert_eq!(outcome.error.as_deref(), Some(PROJECT_NOT_FOUND));
    assert_eq!(provider.create_calls(), 0);
    assert_eq!(status_of(&store, "p1"), ProjectStatus::Draft);
}

#[tokio::test]
async fn test_start_refused_by_store_releases_monitor() {
    let provider =
        Arc::new(ScriptedProvider::new().on_create(Ok(descriptor("d1", RemoteState::Building))));
    let store = Arc::new(RefusingStore {
        project: generated_project("p1"),
    });
    let orchestrator = Orchestrator::new(provider.clone(), store, fast_settings());

    let outcome = orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some(DEPLOYMENT_NOT_RECORDED));
    assert_eq!(outcome.retryable, Some(false));
    assert_eq!(provider.create_calls(), 1);
    assert!(!orchestrator.registry().is_active("p1"));
}

#[tokio::test]
async fn test_second_start_while_monitoring_is_refused() {
    let (orchestrator, provider, _store) = setup(
        ScriptedProvider::new()
            .on_create(Ok(descriptor("d1", RemoteState::Building)))
            .on_create(Ok(descriptor("d2", RemoteState::Building))),
        vec![generated_project("p1")],
    );

    let first = orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;
    let second = orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;

    assert!(first.success);
    assert!(!second.success);
    assert_eq!(second.error.as_deref(), Some(DEPLOYMENT_IN_PROGRESS));
    assert_eq!(provider.create_calls(), 1);
}

// ================================= MONITOR ===================================== //

#[tokio::test]
async fn test_monitor_marks_ready_deployment_deployed() {
    let (orchestrator, _provider, store) = setup(
        ScriptedProvider::new()
            .on_create(Ok(descriptor("d1", RemoteState::Building)))
            .on_status(
                "d1",
                vec![
                    Ok(descriptor("d1", RemoteState::Building)),
                    Ok(descriptor("d1", RemoteState::Ready)),
                ],
            ),
        vec![generated_project("p1")],
    );

    let outcome = orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;
    assert!(outcome.success);

    assert!(settles_at(&store, "p1", ProjectStatus::Deployed).await);
    let project = store.get("p1").unwrap();
    assert_eq!(project.deployment_url.as_deref(), Some("https://d1.host"));
    assert!(monitor_released(&orchestrator, "p1").await);
}

#[tokio::test]
async fn test_monitor_fails_on_permanent_remote_error() {
    let (orchestrator, provider, store) = setup(
        ScriptedProvider::new()
            .on_create(Ok(descriptor("d1", RemoteState::Building)))
            .on_status("d1", vec![Ok(failed_descriptor("d1", "BUILD_FAILED"))]),
        vec![generated_project("p1")],
    );

    orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;

    assert!(settles_at(&store, "p1", ProjectStatus::Failed).await);
    assert_eq!(provider.create_calls(), 1);
    assert!(store.get("p1").unwrap().deployment_url.is_none());
}

#[tokio::test]
async fn test_monitor_resubmits_transient_failure() {
    let (orchestrator, provider, store) = setup(
        ScriptedProvider::new()
            .on_create(Ok(descriptor("d1", RemoteState::Building)))
            .on_create(Ok(descriptor("d2", RemoteState::Building)))
            .on_status("d1", vec![Ok(failed_descriptor("d1", "ETIMEDOUT"))])
            .on_status("d2", vec![Ok(descriptor("d2", RemoteState::Ready))]),
        vec![generated_project("p1")],
    );

    orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;

    assert!(settles_at(&store, "p1", ProjectStatus::Deployed).await);
    let project = store.get("p1").unwrap();
    assert_eq!(project.deployment_id.as_deref(), Some("d2"));
    assert_eq!(project.deployment_url.as_deref(), Some("https://d2.host"));
    assert_eq!(provider.create_calls(), 2);
}

#[tokio::test]
async fn test_monitor_recovers_from_failed_resubmission() {
    let (orchestrator, provider, store) = setup(
        ScriptedProvider::new()
            .on_create(Ok(descriptor("d1", RemoteState::Building)))
            .on_create(Err(ProviderError::Timeout("Request timeout".to_string())))
            .on_create(Ok(descriptor("d2", RemoteState::Building)))
            .on_status("d1", vec![Ok(failed_descriptor("d1", "ETIMEDOUT"))])
            .on_status("d2", vec![Ok(descriptor("d2", RemoteState::Ready))]),
        vec![generated_project("p1")],
    );

    orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;

    assert!(settles_at(&store, "p1", ProjectStatus::Deployed).await);
    let project = store.get("p1").unwrap();
    assert_eq!(project.deployment_id.as_deref(), Some("d2"));
    assert_eq!(project.deployment_url.as_deref(), Some("https://d2.host"));
    assert_eq!(provider.create_calls(), 3);
    assert!(monitor_released(&orchestrator, "p1").await);
}

#[tokio::test]
async fn test_monitor_stops_on_rejected_resubmission() {
    let (orchestrator, provider, store) = setup(
        ScriptedProvider::new()
            .on_create(Ok(descriptor("d1", RemoteState::Building)))
            .on_create(Err(ProviderError::Unauthorized("Invalid token".to_string())))
            .on_create(Ok(descriptor("d2", RemoteState::Ready)))
            .on_status("d1", vec![Ok(failed_descriptor("d1", "ECONNRESET"))]),
        vec![generated_project("p1")],
    );

    orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;

    assert!(settles_at(&store, "p1", ProjectStatus::Failed).await);
    assert!(monitor_released(&orchestrator, "p1").await);
    assert_eq!(provider.create_calls(), 2);
    assert!(store.get("p1").unwrap().deployment_url.is_none());
}

#[tokio::test]
async fn test_failed_resubmission_spends_retry_budget() {
    let (orchestrator, provider, store) = setup(
        ScriptedProvider::new()
            .on_create(Ok(descriptor("d1", RemoteState::Building)))
            .on_create(Err(ProviderError::Timeout("Request timeout".to_string())))
            .on_create(Ok(descriptor("d2", RemoteState::Ready)))
            .on_status("d1", vec![Ok(failed_descriptor("d1", "ETIMEDOUT"))]),
        vec![generated_project("p1")],
    );

    orchestrator
        .start_deployment(
            context("p1")
                .with_source_repo("acme/shop")
                .with_max_retries(1),
        )
        .await;

    assert!(settles_at(&store, "p1", ProjectStatus::Failed).await);
    assert!(monitor_released(&orchestrator, "p1").await);
    // The failed resubmission used the only retry
    assert_eq!(provider.create_calls(), 2);
}

#[tokio::test]
async fn test_retry_budget_is_bounded() {
    let mut provider = ScriptedProvider::new();
    for id in ["d1", "d2", "d3", "d4", "d5"] {
        provider = provider
            .on_create(Ok(descriptor(id, RemoteState::Building)))
            .on_status(id, vec![Ok(failed_descriptor(id, "ECONNRESET"))]);
    }
    let (orchestrator, provider, store) = setup(provider, vec![generated_project("p1")]);

    orchestrator
        .start_deployment(
            context("p1")
                .with_source_repo("acme/shop")
                .with_max_retries(2),
        )
        .await;

    assert!(settles_at(&store, "p1", ProjectStatus::Failed).await);
    assert!(monitor_released(&orchestrator, "p1").await);
    // One submission plus two resubmissions
    assert_eq!(provider.create_calls(), 3);
    assert_eq!(store.get("p1").unwrap().deployment_id.as_deref(), Some("d3"));
}

#[tokio::test]
async fn test_zero_retry_budget_fails_immediately() {
    let (orchestrator, provider, store) = setup(
        ScriptedProvider::new()
            .on_create(Ok(descriptor("d1", RemoteState::Building)))
            .on_status("d1", vec![Err(ProviderError::Timeout("Request timeout".to_string()))]),
        vec![generated_project("p1")],
    );

    orchestrator
        .start_deployment(
            context("p1")
                .with_source_repo("acme/shop")
                .with_max_retries(0),
        )
        .await;

    assert!(settles_at(&store, "p1", ProjectStatus::Failed).await);
    assert_eq!(provider.create_calls(), 1);
}

#[tokio::test]
async fn test_provider_cancel_fails_project() {
    let (orchestrator, _provider, store) = setup(
        ScriptedProvider::new()
            .on_create(Ok(descriptor("d1", RemoteState::Building)))
            .on_status("d1", vec![Ok(descriptor("d1", RemoteState::Canceled))]),
        vec![generated_project("p1")],
    );

    orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;

    assert!(settles_at(&store, "p1", ProjectStatus::Failed).await);
}

#[tokio::test]
async fn test_monitor_times_out_stuck_build() {
    let (orchestrator, _provider, store) = {
        let provider = Arc::new(
            ScriptedProvider::new().on_create(Ok(descriptor("d1", RemoteState::Building))),
        );
        let store = Arc::new(MemoryProjectStore::with_projects(vec![generated_project("p1")]));
        let mut settings = fast_settings();
        settings.max_wait = Duration::from_millis(30);
        let orchestrator = crate::support::orchestrator(provider.clone(), store.clone(), settings);
        (orchestrator, provider, store)
    };

    orchestrator
        .start_deployment(
            context("p1")
                .with_source_repo("acme/shop")
                .with_max_retries(0),
        )
        .await;

    assert!(settles_at(&store, "p1", ProjectStatus::Failed).await);
}

// ================================= CANCEL ===================================== //

#[tokio::test]
async fn test_cancel_wins_over_later_ready() {
    let mut statuses = vec![Ok(descriptor("d1", RemoteState::Building)); 5];
    statuses.push(Ok(descriptor("d1", RemoteState::Ready)));
    let (orchestrator, _provider, store) = setup(
        ScriptedProvider::new()
            .on_create(Ok(descriptor("d1", RemoteState::Building)))
            .on_status("d1", statuses),
        vec![generated_project("p1")],
    );

    let started = orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;
    assert!(started.success);

    let canceled = orchestrator.cancel_deployment("p1", "u1").await;
    assert!(canceled.success);
    assert!(canceled.error.is_none());

    assert!(monitor_released(&orchestrator, "p1").await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let project = store.get("p1").unwrap();
    assert_eq!(project.status, ProjectStatus::Failed);
    assert!(project.deployment_url.is_none());
}

#[tokio::test]
async fn test_cancel_deployed_project_is_refused() {
    let mut project = generated_project("p1");
    project.status = ProjectStatus::Deployed;
    let (orchestrator, _provider, store) = setup(ScriptedProvider::new(), vec![project]);

    let outcome = orchestrator.cancel_deployment("p1", "u1").await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some(NO_DEPLOYMENT_IN_PROGRESS));
    assert_eq!(status_of(&store, "p1"), ProjectStatus::Deployed);
}

#[tokio::test]
async fn test_cancel_checks_ownership() {
    let mut project = generated_project("p1");
    project.status = ProjectStatus::Deploying;
    let (orchestrator, _provider, store) = setup(ScriptedProvider::new(), vec![project]);

    let outcome = orchestrator.cancel_deployment("p1", "someone-else").await;

    assert_eq!(outcome.error.as_deref(), Some(PROJECT_NOT_FOUND));
    assert_eq!(status_of(&store, "p1"), ProjectStatus::Deploying);
}

// ================================= RETRY ===================================== //

#[tokio::test]
async fn test_retry_requires_generated_project() {
    let mut project = Project::new("p1", "u1", "My Shop");
    project.status = ProjectStatus::Failed;
    let (orchestrator, provider, _store) = setup(ScriptedProvider::new(), vec![project]);

    let outcome = orchestrator
        .retry_deployment(context("p1").with_source_repo("acme/shop"))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.as_deref(), Some(PROJECT_NOT_GENERATED));
    assert_eq!(provider.create_calls(), 0);
}

#[tokio::test]
async fn test_retry_unknown_project() {
    let (orchestrator, provider, _store) = setup(ScriptedProvider::new(), vec![]);

    let outcome = orchestrator.retry_deployment(context("p1")).await;

    assert_eq!(outcome.error.as_deref(), Some(PROJECT_NOT_FOUND));
    assert_eq!(provider.create_calls(), 0);
}

#[tokio::test]
async fn test_retry_defaults_to_project_repository() {
    let mut project = generated_project("p1");
    project.status = ProjectStatus::Failed;
    let (orchestrator, provider, store) = setup(
        ScriptedProvider::new().on_create(Ok(descriptor("d7", RemoteState::Building))),
        vec![project],
    );

    let outcome = orchestrator.retry_deployment(context("p1")).await;

    assert!(outcome.success);
    assert_eq!(outcome.deployment_id.as_deref(), Some("d7"));
    assert_eq!(provider.submitted_sources(), vec!["acme/shop".to_string()]);
    assert_eq!(status_of(&store, "p1"), ProjectStatus::Deploying);
}

#[tokio::test]
async fn test_retry_right_after_cancel() {
    let (orchestrator, provider, store) = setup(
        ScriptedProvider::new()
            .on_create(Ok(descriptor("d1", RemoteState::Building)))
            .on_create(Ok(descriptor("d2", RemoteState::Building))),
        vec![generated_project("p1")],
    );

    let started = orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;
    assert!(started.success);

    let canceled = orchestrator.cancel_deployment("p1", "u1").await;
    assert!(canceled.success);
    assert_eq!(status_of(&store, "p1"), ProjectStatus::Failed);

    let retried = orchestrator.retry_deployment(context("p1")).await;
    assert!(retried.success);
    assert_eq!(retried.deployment_id.as_deref(), Some("d2"));
    assert_eq!(provider.create_calls(), 2);

    // The cancelled monitor exits without touching the new attempt
    tokio::time::sleep(Duration::from_millis(50)).await;
    let project = store.get("p1").unwrap();
    assert_eq!(project.status, ProjectStatus::Deploying);
    assert_eq!(project.deployment_id.as_deref(), Some("d2"));
    assert!(orchestrator.registry().is_active("p1"));
}

// ================================= STATUS ===================================== //

#[tokio::test]
async fn test_status_of_owned_project() {
    let (orchestrator, _provider, _store) =
        setup(ScriptedProvider::new(), vec![generated_project("p1")]);

    let status = assert_ok!(orchestrator.get_deployment_status("p1", "u1").await);
    assert_eq!(status.status, ProjectStatus::Draft);
    assert!(status.deployment_url.is_none());

    let missing = orchestrator.get_deployment_status("p1", "u2").await;
    assert!(matches!(missing, Err(OrchestratorError::ProjectNotFound(_))));
}

// ================================= CLEANUP ===================================== //

#[tokio::test]
async fn test_cleanup_resets_old_failures_once() {
    let mut projects: Vec<Project> = (0..5)
        .map(|i| {
            aged(
                generated_project(&format!("old-{}", i)),
                ProjectStatus::Failed,
                chrono::Duration::days(8),
            )
        })
        .collect();
    projects.push(aged(
        generated_project("recent"),
        ProjectStatus::Failed,
        chrono::Duration::days(1),
    ));
    projects.push(aged(
        generated_project("live"),
        ProjectStatus::Deployed,
        chrono::Duration::days(30),
    ));
    let (orchestrator, _provider, store) = setup(ScriptedProvider::new(), projects);

    assert_eq!(orchestrator.cleanup_failed_deployments(Some(7)).await, 5);
    assert_eq!(orchestrator.cleanup_failed_deployments(Some(7)).await, 0);

    assert_eq!(status_of(&store, "old-0"), ProjectStatus::Pending);
    assert_eq!(status_of(&store, "recent"), ProjectStatus::Failed);
    assert_eq!(status_of(&store, "live"), ProjectStatus::Deployed);
}

#[tokio::test]
async fn test_cleanup_defaults_to_seven_days() {
    let projects = vec![
        aged(generated_project("a"), ProjectStatus::Failed, chrono::Duration::days(8)),
        aged(generated_project("b"), ProjectStatus::Failed, chrono::Duration::days(6)),
    ];
    let (orchestrator, _provider, _store) = setup(ScriptedProvider::new(), projects);

    assert_eq!(orchestrator.cleanup_failed_deployments(None).await, 1);
}

#[tokio::test]
async fn test_cleanup_swallows_store_errors() {
    let orchestrator = Orchestrator::new(
        Arc::new(ScriptedProvider::new()),
        Arc::new(FailingStore),
        fast_settings(),
    );

    assert_eq!(orchestrator.cleanup_failed_deployments(Some(7)).await, 0);
    assert_eq!(
        orchestrator
            .cleanup_stale_deployments(Duration::from_secs(60))
            .await,
        0
    );
}

#[tokio::test]
async fn test_stale_deploying_is_failed_unless_monitored() {
    let orphan = aged(
        generated_project("orphan"),
        ProjectStatus::Deploying,
        chrono::Duration::hours(7),
    );
    let (orchestrator, _provider, store) = setup(
        ScriptedProvider::new().on_create(Ok(descriptor("d1", RemoteState::Building))),
        vec![orphan, generated_project("p1")],
    );

    let started = orchestrator
        .start_deployment(context("p1").with_source_repo("acme/shop"))
        .await;
    assert!(started.success);

    let failed = orchestrator
        .cleanup_stale_deployments(Duration::ZERO)
        .await;

    assert_eq!(failed, 1);
    assert_eq!(status_of(&store, "orphan"), ProjectStatus::Failed);
    assert_eq!(status_of(&store, "p1"), ProjectStatus::Deploying);
}
