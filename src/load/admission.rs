use crate::error::LoaderError;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting gate on the number of insertions in flight.
#[derive(Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// One granted slot. Travels with its task to the collector, which releases it.
#[derive(Debug)]
pub struct Admission {
    permit: OwnedSemaphorePermit,
}

impl AdmissionController {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait until a slot is free.
    pub async fn acquire(&self) -> Result<Admission, LoaderError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LoaderError::AdmissionClosed)?;
        Ok(Admission { permit })
    }
}

impl Admission {
    /// Return the slot to the controller.
    pub fn release(self) {
        drop(self.permit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn acquire_blocks_until_release() {
        let controller = AdmissionController::new(1);
        let first = controller.acquire().await.unwrap();
        assert_eq!(controller.available(), 0);

        let blocked = tokio::time::timeout(Duration::from_millis(20), controller.acquire()).await;
        assert!(blocked.is_err());

        first.release();
        let second = tokio::time::timeout(Duration::from_millis(200), controller.acquire())
            .await
            .expect("slot freed by release")
            .unwrap();
        assert_eq!(controller.available(), 0);
        second.release();
        assert_eq!(controller.available(), controller.capacity());
    }
}
