//! Server state

use std::sync::Arc;

use crate::deploy::orchestrator::Orchestrator;

/// Server state shared across handlers
pub struct ServerState {
    pub orchestrator: Arc<Orchestrator>,

    /// Retry budget applied when a request does not carry one
    pub default_max_retries: u32,
}

impl ServerState {
    pub fn new(orchestrator: Arc<Orchestrator>, default_max_retries: u32) -> Self {
        Self {
            orchestrator,
            default_max_retries,
        }
    }
}
