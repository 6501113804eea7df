//! Vercel deployments client

use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use provider_api::models::{
    CreateDeploymentRequest, DeploymentResponse, ErrorResponse, GitSource, ReadyState,
    GIT_SOURCE_GITHUB, TARGET_PRODUCTION,
};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error};
use url::Url;

use crate::errors::{OrchestratorError, ProviderError};
use crate::models::deployment::{DeploymentDescriptor, RemoteState};
use crate::provider::ProviderClient;

/// Message used when the provider returns an error without a body
pub const DEFAULT_ERROR_MESSAGE: &str = "Vercel API error";

const DEPLOYMENTS_PATH: &str = "/v13/deployments";
const DEFAULT_GIT_REF: &str = "main";

/// HTTP client for the Vercel deployments API
pub struct VercelClient {
    client: Client,
    base_url: Url,
    team_id: Option<String>,
}

impl VercelClient {
    /// Create a new client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OrchestratorError> {
        let client = Client::builder().timeout(timeout).build()?;

        let base_url = Url::parse(base_url).map_err(|e| {
            OrchestratorError::ConfigError(format!("Invalid provider URL {}: {}", base_url, e))
        })?;

        Ok(Self {
            client,
            base_url,
            team_id: None,
        })
    }

    /// Scope all requests to a team
    pub fn with_team_id(mut self, team_id: Option<String>) -> Self {
        self.team_id = team_id;
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ProviderError::Rejected(format!("Invalid deployment path: {}", e)))?;

        if let Some(team_id) = &self.team_id {
            url.query_pairs_mut().append_pair("teamId", team_id);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<DeploymentDescriptor, ProviderError> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Provider request failed: {} - {}", status, body);
            return Err(error_from_response(status, &body));
        }

        let body: DeploymentResponse = response.json().await?;
        Ok(descriptor_from_response(body))
    }
}

#[async_trait]
impl ProviderClient for VercelClient {
    async fn create_deployment(
        &self,
        token: &SecretString,
        target_name: &str,
        source_repo: &str,
        production: bool,
    ) -> Result<DeploymentDescriptor, ProviderError> {
        let body = CreateDeploymentRequest {
            name: target_name.to_string(),
            target: production.then(|| TARGET_PRODUCTION.to_string()),
            git_source: parse_source_repo(source_repo)?,
        };

        let url = self.endpoint(DEPLOYMENTS_PATH)?;
        debug!("POST {}", url);

        let request = self
            .client
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(&body);
        self.send(request).await
    }

    async fn get_deployment_status(
        &self,
        token: &SecretString,
        deployment_id: &str,
    ) -> Result<DeploymentDescriptor, ProviderError> {
        if deployment_id.is_empty() || deployment_id.contains('/') {
            return Err(ProviderError::NotFound(format!(
                "Invalid deployment id: {:?}",
                deployment_id
            )));
        }

        let url = self.endpoint(&format!("{}/{}", DEPLOYMENTS_PATH, deployment_id))?;
        debug!("GET {}", url);

        let request = self.client.get(url).bearer_auth(token.expose_secret());
        self.send(request).await
    }
}

/// Map a non-2xx provider response to an error kind
pub fn error_from_response(status: StatusCode, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .map(|response| response.error.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized(message),
        StatusCode::NOT_FOUND => ProviderError::NotFound(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ProviderError::Timeout(message),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => {
            ProviderError::Transport(message)
        }
        _ => ProviderError::Rejected(message),
    }
}

/// Convert the provider's response into a descriptor
pub fn descriptor_from_response(response: DeploymentResponse) -> DeploymentDescriptor {
    let remote_state = match response.ready_state {
        ReadyState::Ready => RemoteState::Ready,
        ReadyState::Error => RemoteState::Error,
        ReadyState::Canceled => RemoteState::Canceled,
        ReadyState::Queued | ReadyState::Initializing | ReadyState::Building | ReadyState::Unknown => {
            RemoteState::Building
        }
    };

    DeploymentDescriptor {
        id: response.id,
        url: response.url,
        remote_state,
        inspector_url: response.inspector_url,
        error_message: response.error_message.or(response.error_code),
    }
}

/// Parse `org/repo`, `org/repo#ref` or a GitHub URL into a git source
pub fn parse_source_repo(source_repo: &str) -> Result<GitSource, ProviderError> {
    let trimmed = source_repo.trim();
    let (path, git_ref) = match trimmed.split_once('#') {
        Some((path, git_ref)) if !git_ref.is_empty() => (path, git_ref),
        Some((path, _)) => (path, DEFAULT_GIT_REF),
        None => (trimmed, DEFAULT_GIT_REF),
    };

    let path = path
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_start_matches("github.com/")
        .trim_end_matches('/')
        .trim_end_matches(".git");

    let mut segments = path.split('/');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(org), Some(repo), None) if !org.is_empty() && !repo.is_empty() => Ok(GitSource {
            kind: GIT_SOURCE_GITHUB.to_string(),
            org: org.to_string(),
            repo: repo.to_string(),
            git_ref: git_ref.to_string(),
        }),
        _ => Err(ProviderError::Rejected(format!(
            "Invalid source repository: {}",
            source_repo
        ))),
    }
}
