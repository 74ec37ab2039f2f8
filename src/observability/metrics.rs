//! Operational counters
//!
//! - Counters only, monotonic between resets
//! - Shared by the store and the session manager through an `Arc`
//! - `reset()` zeroes every counter at once; it is the only way a value
//!   goes down

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Registry of atomic counters
///
/// Relaxed ordering is enough: counters are independent and only read for
/// reporting.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    snapshot_loads: AtomicU64,
    snapshot_writes: AtomicU64,
    write_failures: AtomicU64,
    posts_created: AtomicU64,
    posts_deleted: AtomicU64,
    logins: AtomicU64,
    login_failures: AtomicU64,
    auth_failures: AtomicU64,
    /// Requests served by the front end
    hits: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Store

    pub fn increment_snapshot_loads(&self) {
        self.snapshot_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_snapshot_writes(&self) {
        self.snapshot_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_write_failures(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_posts_created(&self) {
        self.posts_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_posts_deleted(&self) {
        self.posts_deleted.fetch_add(1, Ordering::Relaxed);
    }

    // Sessions

    pub fn increment_logins(&self) {
        self.logins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_login_failures(&self) {
        self.login_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_auth_failures(&self) {
        self.auth_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Front end

    pub fn increment_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Zero every counter
    pub fn reset(&self) {
        for counter in [
            &self.snapshot_loads,
            &self.snapshot_writes,
            &self.write_failures,
            &self.posts_created,
            &self.posts_deleted,
            &self.logins,
            &self.login_failures,
            &self.auth_failures,
            &self.hits,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            snapshot_loads: self.snapshot_loads.load(Ordering::Relaxed),
            snapshot_writes: self.snapshot_writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            posts_created: self.posts_created.load(Ordering::Relaxed),
            posts_deleted: self.posts_deleted.load(Ordering::Relaxed),
            logins: self.logins.load(Ordering::Relaxed),
            login_failures: self.login_failures.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }
}

/// Serializable counter values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub snapshot_loads: u64,
    pub snapshot_writes: u64,
    pub write_failures: u64,
    pub posts_created: u64,
    pub posts_deleted: u64,
    pub logins: u64,
    pub login_failures: u64,
    pub auth_failures: u64,
    pub hits: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters_start_at_zero() {
        assert_eq!(MetricsRegistry::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_increments_are_counted() {
        let metrics = MetricsRegistry::new();
        metrics.increment_logins();
        metrics.increment_logins();
        metrics.increment_auth_failures();

        let snap = metrics.snapshot();
        assert_eq!(snap.logins, 2);
        assert_eq!(snap.auth_failures, 1);
        assert_eq!(snap.login_failures, 0);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let metrics = MetricsRegistry::new();
        metrics.increment_hits();
        metrics.increment_snapshot_writes();
        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_concurrent_hits() {
        let metrics = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..250 {
                        metrics.increment_hits();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.hits(), 1000);
    }
}
