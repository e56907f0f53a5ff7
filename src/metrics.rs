use serde::Serialize;
use std::sync::RwLock;

/// Process-local job counters.
///
/// Monotonic within the process; reset on restart. These are advisory
/// observability numbers, never an input to queue decisions.
#[derive(Debug, Default)]
pub struct Metrics {
    inner: RwLock<Counters>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    total_jobs: u64,
    completed_jobs: u64,
    failed_jobs: u64,
    retried_jobs: u64,
}

/// Point-in-time view of all counters.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub total_jobs: u64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub retried_jobs: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr_total_jobs(&self) {
        self.inner.write().expect("metrics lock poisoned").total_jobs += 1;
    }

    pub fn incr_completed_jobs(&self) {
        self.inner.write().expect("metrics lock poisoned").completed_jobs += 1;
    }

    pub fn incr_failed_jobs(&self) {
        self.inner.write().expect("metrics lock poisoned").failed_jobs += 1;
    }

    pub fn incr_retried_jobs(&self) {
        self.inner.write().expect("metrics lock poisoned").retried_jobs += 1;
    }

    /// Consistent snapshot of all four counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = *self.inner.read().expect("metrics lock poisoned");
        MetricsSnapshot {
            total_jobs: counters.total_jobs,
            completed_jobs: counters.completed_jobs,
            failed_jobs: counters.failed_jobs,
            retried_jobs: counters.retried_jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn snapshot_reflects_increments() {
        let metrics = Metrics::new();

        metrics.incr_total_jobs();
        metrics.incr_total_jobs();
        metrics.incr_completed_jobs();
        metrics.incr_retried_jobs();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_jobs, 2);
        assert_eq!(snapshot.completed_jobs, 1);
        assert_eq!(snapshot.failed_jobs, 0);
        assert_eq!(snapshot.retried_jobs, 1);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let metrics = Arc::new(Metrics::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.incr_total_jobs();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(metrics.snapshot().total_jobs, 800);
    }
}
