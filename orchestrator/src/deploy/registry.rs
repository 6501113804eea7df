//! Registry of live background monitors

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

struct MonitorEntry {
    generation: u64,
    cancel_tx: watch::Sender<bool>,
}

/// Tracks which projects have a monitor, one at most per project
#[derive(Default)]
pub struct MonitorRegistry {
    entries: Mutex<HashMap<String, MonitorEntry>>,
    next_generation: AtomicU64,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the monitor slot for a project.
    ///
    /// Returns `None` while another slot for the same project is alive. The
    /// slot is released when dropped.
    pub fn reserve(self: &Arc<Self>, project_id: &str) -> Option<MonitorSlot> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(project_id) {
            return None;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        entries.insert(
            project_id.to_string(),
            MonitorEntry {
                generation,
                cancel_tx,
            },
        );

        Some(MonitorSlot {
            registry: Arc::clone(self),
            project_id: project_id.to_string(),
            generation,
            cancel_rx,
        })
    }

    /// Signal the project's monitor to stop and free its slot; returns whether
    /// one was live.
    ///
    /// The project can be reserved again right away. The cancelled slot keeps
    /// reporting `is_cancelled()` until its task drops it.
    pub fn cancel(&self, project_id: &str) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.remove(project_id) {
            Some(entry) => {
                entry.cancel_tx.send_replace(true);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, project_id: &str) -> bool {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(project_id)
    }

    /// Projects with a live monitor
    pub fn active_projects(&self) -> Vec<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.keys().cloned().collect()
    }

    fn release(&self, project_id: &str, generation: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries
            .get(project_id)
            .is_some_and(|entry| entry.generation == generation)
        {
            entries.remove(project_id);
        }
    }
}

/// Exclusive right to monitor one project
pub struct MonitorSlot {
    registry: Arc<MonitorRegistry>,
    project_id: String,
    generation: u64,
    cancel_rx: watch::Receiver<bool>,
}

impl MonitorSlot {
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Resolve once the slot is cancelled
    pub async fn cancelled(&mut self) {
        let closed = self.cancel_rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed && !self.is_cancelled() {
            // Entry gone without a cancel signal
            std::future::pending::<()>().await;
        }
    }
}

impl Drop for MonitorSlot {
    fn drop(&mut self) {
        self.registry.release(&self.project_id, self.generation);
    }
}
