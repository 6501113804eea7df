//! Settings file management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deploy::fsm::MonitorSettings;
use crate::logs::LogLevel;
use crate::models::deployment::DEFAULT_MAX_RETRIES;
use crate::utils::CooldownOptions;

/// Service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON on stdout
    #[serde(default)]
    pub log_json: bool,

    /// Also write daily-rolling log files under the logs directory
    #[serde(default)]
    pub log_to_file: bool,

    /// Hosting provider configuration
    #[serde(default)]
    pub provider: ProviderSettings,

    /// Background monitor configuration
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Maintenance configuration
    #[serde(default)]
    pub cleanup: CleanupSettings,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_to_file: false,
            provider: ProviderSettings::default(),
            monitor: MonitorConfig::default(),
            cleanup: CleanupSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

/// Hosting provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Base URL of the provider API
    #[serde(default = "default_provider_url")]
    pub base_url: String,

    /// Team the deployments are created under
    #[serde(default)]
    pub team_id: Option<String>,

    /// Timeout of a single provider request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_provider_url() -> String {
    "https://api.vercel.com".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: default_provider_url(),
            team_id: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Background monitor settings as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,

    /// Retry budget used when a request does not carry one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,

    #[serde(default = "default_backoff_max")]
    pub backoff_max_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_max_wait() -> u64 {
    15 * 60
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_backoff_base() -> u64 {
    5
}

fn default_backoff_max() -> u64 {
    120
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_wait_secs: default_max_wait(),
            max_retries: default_max_retries(),
            backoff_base_secs: default_backoff_base(),
            backoff_max_secs: default_backoff_max(),
        }
    }
}

impl MonitorConfig {
    pub fn to_monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_wait: Duration::from_secs(self.max_wait_secs),
            retry_backoff: CooldownOptions {
                base_delay: Duration::from_secs(self.backoff_base_secs),
                max_delay: Duration::from_secs(self.backoff_max_secs),
                multiplier: 2.0,
            },
        }
    }
}

/// Maintenance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupSettings {
    /// Run the periodic cleanup worker
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,

    /// Age in days after which failed projects are reset
    #[serde(default = "default_cleanup_days")]
    pub older_than_days: u32,

    /// Age after which a `deploying` project without a monitor is failed
    #[serde(default = "default_stale_deploying")]
    pub stale_deploying_secs: u64,
}

fn default_cleanup_interval() -> u64 {
    24 * 60 * 60
}

fn default_cleanup_days() -> u32 {
    crate::deploy::orchestrator::DEFAULT_CLEANUP_DAYS
}

fn default_stale_deploying() -> u64 {
    6 * 60 * 60
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_cleanup_interval(),
            older_than_days: default_cleanup_days(),
            stale_deploying_secs: default_stale_deploying(),
        }
    }
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
