use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds in-flight requests; never queues.
#[derive(Debug, Clone)]
pub struct Bulkhead {
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// Held for the lifetime of one admitted request.
#[derive(Debug)]
pub struct BulkheadPermit {
    _permit: OwnedSemaphorePermit,
}

impl Bulkhead {
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// A permit if capacity is left, `None` otherwise.
    pub fn try_acquire(&self) -> Option<BulkheadPermit> {
        self.permits
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| BulkheadPermit { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_beyond_capacity() {
        let bulkhead = Bulkhead::new(2);
        let first = bulkhead.try_acquire().unwrap();
        let _second = bulkhead.try_acquire().unwrap();
        assert!(bulkhead.try_acquire().is_none());
        assert_eq!(bulkhead.in_flight(), 2);

        drop(first);
        assert!(bulkhead.try_acquire().is_some());
    }
}
