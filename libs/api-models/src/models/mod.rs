//! API models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Start deployment request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartDeploymentRequest {
    pub project_id: String,
    pub user_id: String,
    pub provider_token: String,
    pub target_name: String,
    #[serde(default)]
    pub source_repo: Option<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

/// Retry deployment request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryDeploymentRequest {
    pub user_id: String,
    pub provider_token: String,
    pub target_name: String,
    #[serde(default)]
    pub source_repo: Option<String>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

/// Cancel deployment request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelDeploymentRequest {
    pub user_id: String,
}

/// Owner query for status lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerQuery {
    pub user_id: String,
}

/// Cleanup query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupQuery {
    pub days: Option<u32>,
}

/// Result of a deployment operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

/// Deployment status of a project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatusResponse {
    pub status: String,
    pub deployment_url: Option<String>,
    pub last_updated: DateTime<Utc>,
}

/// Cleanup response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub reset: u64,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Version response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
