//! HTTP request handlers

use std::sync::Arc;

use api_models::models::{
    CancelDeploymentRequest, CleanupQuery, CleanupResponse, DeploymentOutcome,
    DeploymentStatusResponse, ErrorResponse, HealthResponse, OwnerQuery, RetryDeploymentRequest,
    StartDeploymentRequest, VersionResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use secrecy::SecretString;
use tracing::error;

use crate::errors::OrchestratorError;
use crate::models::deployment::DeploymentContext;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Error returned by handlers
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        let (status, error) = match &err {
            OrchestratorError::ProjectNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            _ => {
                error!("Request failed: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        Self {
            status,
            body: ErrorResponse {
                error: error.to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "deployd".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Start a deployment.
///
/// Operation failures are reported in the outcome body, not as HTTP errors.
pub async fn start_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<StartDeploymentRequest>,
) -> Json<DeploymentOutcome> {
    let mut ctx = DeploymentContext::new(
        request.project_id,
        request.user_id,
        SecretString::from(request.provider_token),
        &request.target_name,
    )
    .with_max_retries(request.max_retries.unwrap_or(state.default_max_retries));
    if let Some(source_repo) = request.source_repo {
        ctx = ctx.with_source_repo(source_repo);
    }

    Json(state.orchestrator.start_deployment(ctx).await.into())
}

/// Deployment status of a project
pub async fn status_handler(
    State(state): State<Arc<ServerState>>,
    Path(project_id): Path<String>,
    Query(owner): Query<OwnerQuery>,
) -> Result<Json<DeploymentStatusResponse>, ApiError> {
    let status = state
        .orchestrator
        .get_deployment_status(&project_id, &owner.user_id)
        .await?;
    Ok(Json(status.into()))
}

/// Cancel the in-flight deployment of a project
pub async fn cancel_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(project_id): Path<String>,
    Json(request): Json<CancelDeploymentRequest>,
) -> Json<DeploymentOutcome> {
    Json(
        state
            .orchestrator
            .cancel_deployment(&project_id, &request.user_id)
            .await
            .into(),
    )
}

/// Retry the deployment of a project
pub async fn retry_deployment_handler(
    State(state): State<Arc<ServerState>>,
    Path(project_id): Path<String>,
    Json(request): Json<RetryDeploymentRequest>,
) -> Json<DeploymentOutcome> {
    let mut ctx = DeploymentContext::new(
        project_id,
        request.user_id,
        SecretString::from(request.provider_token),
        &request.target_name,
    )
    .with_max_retries(request.max_retries.unwrap_or(state.default_max_retries));
    if let Some(source_repo) = request.source_repo {
        ctx = ctx.with_source_repo(source_repo);
    }

    Json(state.orchestrator.retry_deployment(ctx).await.into())
}

/// Reset failed deployments older than `days`
pub async fn cleanup_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<CleanupQuery>,
) -> Json<CleanupResponse> {
    let reset = state
        .orchestrator
        .cleanup_failed_deployments(query.days)
        .await;
    Json(CleanupResponse { reset })
}
