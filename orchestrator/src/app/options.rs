//! Application configuration options

use std::time::Duration;

use crate::deploy::fsm::MonitorSettings;
use crate::models::deployment::DEFAULT_MAX_RETRIES;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::workers::cleanup;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage layout paths
    pub layout: StorageLayout,

    /// Hosting provider client configuration
    pub provider: ProviderOptions,

    /// Background monitor settings
    pub monitor: MonitorSettings,

    /// Retry budget applied when a request does not carry one
    pub default_max_retries: u32,

    /// Enable the periodic cleanup worker
    pub enable_cleanup_worker: bool,

    /// Cleanup worker options
    pub cleanup_worker: cleanup::Options,

    /// Server configuration
    pub server: ServerOptions,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            layout: StorageLayout::default(),
            provider: ProviderOptions::default(),
            monitor: MonitorSettings::default(),
            default_max_retries: DEFAULT_MAX_RETRIES,
            enable_cleanup_worker: true,
            cleanup_worker: cleanup::Options::default(),
            server: ServerOptions::default(),
        }
    }
}

impl AppOptions {
    /// Build options from the settings file
    pub fn from_settings(settings: &Settings, layout: StorageLayout) -> Self {
        Self {
            layout,
            provider: ProviderOptions {
                base_url: settings.provider.base_url.clone(),
                team_id: settings.provider.team_id.clone(),
                request_timeout: Duration::from_secs(settings.provider.request_timeout_secs),
            },
            monitor: settings.monitor.to_monitor_settings(),
            default_max_retries: settings.monitor.max_retries,
            enable_cleanup_worker: settings.cleanup.enabled,
            cleanup_worker: cleanup::Options {
                interval: Duration::from_secs(settings.cleanup.interval_secs),
                older_than_days: settings.cleanup.older_than_days,
                stale_deploying_after: Duration::from_secs(settings.cleanup.stale_deploying_secs),
                ..Default::default()
            },
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            ..Default::default()
        }
    }
}

/// Lifecycle options for the service
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Hosting provider client options
#[derive(Debug, Clone)]
pub struct ProviderOptions {
    pub base_url: String,
    pub team_id: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            base_url: "https://api.vercel.com".to_string(),
            team_id: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
