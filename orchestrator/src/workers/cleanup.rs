//! Periodic maintenance of deployment state

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info};

use crate::deploy::orchestrator::{Orchestrator, DEFAULT_CLEANUP_DAYS};

/// Cleanup worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Delay between two cleanup passes
    pub interval: Duration,

    /// Initial delay before the first pass
    pub initial_delay: Duration,

    /// Age in days after which failed projects are reset to pending
    pub older_than_days: u32,

    /// Age after which an unmonitored `deploying` project is failed
    pub stale_deploying_after: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(24 * 60 * 60),
            initial_delay: Duration::from_secs(60),
            older_than_days: DEFAULT_CLEANUP_DAYS,
            stale_deploying_after: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// Run one cleanup pass; returns (stale failed, failed reset)
pub async fn run_once(options: &Options, orchestrator: &Orchestrator) -> (u64, u64) {
    // Stale rows first so they become eligible for the reset on a later pass.
    let stale = orchestrator
        .cleanup_stale_deployments(options.stale_deploying_after)
        .await;
    let reset = orchestrator
        .cleanup_failed_deployments(Some(options.older_than_days))
        .await;
    (stale, reset)
}

/// Run the cleanup worker
pub async fn run<S, F>(
    options: &Options,
    orchestrator: &Orchestrator,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Cleanup worker starting...");

    let mut wait = options.initial_delay;
    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Cleanup worker shutting down...");
                return;
            }
            _ = sleep_fn(wait) => {}
        }
        wait = options.interval;

        debug!("Running deployment cleanup...");
        let (stale, reset) = run_once(options, orchestrator).await;
        info!(
            "Cleanup pass done: {} stale deployments failed, {} failed deployments reset",
            stale, reset
        );
    }
}
