use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::OwnedSemaphorePermit;
use tokio::sync::Semaphore;

use crate::PaceError;

/// One admitted request's share of the [`ConcurrencyGate`].
///
/// The slot is returned to the gate when this value is dropped.
pub(crate) type Slot = OwnedSemaphorePermit;

/// A counting semaphore bounding how many requests are admitted at once.
#[derive(Debug, Clone)]
pub(crate) struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyGate {
    pub(crate) fn new(capacity: NonZeroUsize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity.get())),
            capacity: capacity.get(),
        }
    }

    /// Waits until a slot is free and claims it.
    pub(crate) async fn acquire(&self) -> Result<Slot, PaceError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PaceError::GateClosed)
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub(crate) fn in_use(&self) -> usize {
        self.capacity - self.available()
    }
}
