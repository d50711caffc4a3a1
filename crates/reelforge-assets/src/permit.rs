use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use reelforge_core::{ReelError, ReelResult};

/// The process-wide "one heavy generative step at a time" permit.
///
/// Owned by the orchestrator and handed to whatever runs local models. Clones
/// share the same single slot.
#[derive(Debug, Clone)]
pub struct HeavyPermit {
    slot: Arc<Semaphore>,
}

impl HeavyPermit {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    /// Wait for the slot. The step runs while the returned guard is alive.
    pub async fn acquire(&self) -> ReelResult<OwnedSemaphorePermit> {
        self.slot
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ReelError::Cancelled("heavy-step permit closed".into()))
    }

    pub fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.slot.clone().try_acquire_owned().ok()
    }

    /// True while some heavy step holds the slot.
    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }
}

impl Default for HeavyPermit {
    fn default() -> Self {
        Self::new()
    }
}
