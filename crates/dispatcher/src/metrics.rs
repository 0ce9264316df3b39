//! Delivery counters kept per dispatcher

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one dispatcher instance
#[derive(Debug, Default)]
pub struct DeliveryMetrics {
    /// Payloads accepted by some host
    deliveries: AtomicU64,
    /// Requests issued
    attempts: AtomicU64,
    /// Attempts that failed
    failures: AtomicU64,
    /// Backoff sleeps taken
    backoffs: AtomicU64,
    /// Deliveries abandoned at a retry ceiling
    gave_up: AtomicU64,
    /// Payloads rejected before any attempt
    malformed: AtomicU64,
}

impl DeliveryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_deliveries(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_attempts(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_backoffs(&self) {
        self.backoffs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_gave_up(&self) {
        self.gave_up.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            deliveries: self.deliveries.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            backoffs: self.backoffs.load(Ordering::Relaxed),
            gave_up: self.gave_up.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DeliveryMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub deliveries: u64,
    pub attempts: u64,
    pub failures: u64,
    pub backoffs: u64,
    pub gave_up: u64,
    pub malformed: u64,
}

impl MetricsSnapshot {
    /// Attempts beyond the first of each delivery
    pub fn retries(&self) -> u64 {
        self.attempts.saturating_sub(self.deliveries + self.gave_up)
    }
}
