use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Upper bound on how long one delivery may hold the wake lock.
pub const MAX_WAKE_HOLD: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum WakeError {
    #[error("wake lock not acquired within {0:?}")]
    Timeout(Duration),
    #[error("wake lock closed")]
    Closed,
}

/// Keeps the process from idling out while a reminder is being handled.
/// One permit total; the guard releases it on drop, unwind included, so a
/// panicking delivery can never wedge the lock.
#[derive(Clone)]
pub struct WakeLock {
    permits: Arc<Semaphore>,
}

impl WakeLock {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }

    pub async fn acquire(&self, max_wait: Duration) -> Result<WakeGuard, WakeError> {
        match tokio::time::timeout(max_wait, self.permits.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(WakeGuard { _permit: permit }),
            Ok(Err(_)) => Err(WakeError::Closed),
            Err(_) => Err(WakeError::Timeout(max_wait)),
        }
    }

    #[cfg(test)]
    pub fn is_held(&self) -> bool {
        self.permits.available_permits() == 0
    }
}

impl Default for WakeLock {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WakeGuard {
    _permit: OwnedSemaphorePermit,
}
