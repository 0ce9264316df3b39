//! Host selection for round-robin failover

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

/// Chooses the host for the next attempt.
///
/// Reading the current host and recording a failure are separate calls so
/// that concurrent deliveries sharing one selector stay consistent: a failure
/// only moves the cursor if it still points at the host that failed.
pub trait HostSelector: Send + Sync {
    /// Number of hosts, always non-zero
    fn len(&self) -> usize;

    /// Index of the host the next attempt should target
    fn current(&self) -> usize;

    /// Record that `failed` rejected an attempt. Returns the cursor afterwards.
    fn record_failure(&self, failed: usize) -> usize;
}

/// Cyclic cursor over a fixed host list
#[derive(Debug)]
pub struct RoundRobin {
    len: NonZeroUsize,
    cursor: AtomicUsize,
}

impl RoundRobin {
    /// Start at a uniformly random host so independently started
    /// relays spread their first attempts.
    pub fn new(len: NonZeroUsize) -> Self {
        let start = rand::rng().random_range(0..len.get());
        Self::starting_at(len, start)
    }

    /// Start at a fixed host (wrapped into range)
    pub fn starting_at(len: NonZeroUsize, start: usize) -> Self {
        Self {
            len,
            cursor: AtomicUsize::new(start % len.get()),
        }
    }
}

impl HostSelector for RoundRobin {
    fn len(&self) -> usize {
        self.len.get()
    }

    fn current(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    fn record_failure(&self, failed: usize) -> usize {
        let next = (failed + 1) % self.len.get();
        match self
            .cursor
            .compare_exchange(failed, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => next,
            // Another delivery already moved past this host
            Err(actual) => actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn n(len: usize) -> NonZeroUsize {
        NonZeroUsize::new(len).unwrap()
    }

    #[test]
    fn test_cursor_after_k_failures() {
        for len in 1..=5 {
            for start in 0..len {
                let selector = RoundRobin::starting_at(n(len), start);
                for k in 1..=12 {
                    let current = selector.current();
                    selector.record_failure(current);
                    assert_eq!(selector.current(), (start + k) % len);
                }
            }
        }
    }

    #[test]
    fn test_single_host_stays_pinned() {
        let selector = RoundRobin::starting_at(n(1), 0);
        for _ in 0..20 {
            assert_eq!(selector.record_failure(0), 0);
        }
        assert_eq!(selector.current(), 0);
    }

    #[test]
    fn test_random_start_in_range() {
        for _ in 0..100 {
            let selector = RoundRobin::new(n(3));
            assert!(selector.current() < 3);
        }
    }

    #[test]
    fn test_start_wraps() {
        let selector = RoundRobin::starting_at(n(3), 7);
        assert_eq!(selector.current(), 1);
    }

    #[test]
    fn test_stale_failure_does_not_advance() {
        let selector = RoundRobin::starting_at(n(4), 0);
        assert_eq!(selector.record_failure(0), 1);
        // A second caller that also failed on host 0 sees the cursor already moved
        assert_eq!(selector.record_failure(0), 1);
        assert_eq!(selector.current(), 1);
    }

    #[test]
    fn test_concurrent_failures_on_same_host_advance_once() {
        let selector = Arc::new(RoundRobin::starting_at(n(5), 2));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let selector = Arc::clone(&selector);
                std::thread::spawn(move || selector.record_failure(2))
            })
            .collect();
        for t in threads {
            assert_eq!(t.join().unwrap(), 3);
        }
        assert_eq!(selector.current(), 3);
    }
}
