use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct CheckoutMetrics {
    orders_created: AtomicU64,
    order_failures: AtomicU64,
    polls_started: AtomicU64,
    paid: AtomicU64,
    timeouts: AtomicU64,
    poll_errors: AtomicU64,
    polls_cancelled: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub orders_created: u64,
    pub order_failures: u64,
    pub polls_started: u64,
    pub paid: u64,
    pub timeouts: u64,
    pub poll_errors: u64,
    pub polls_cancelled: u64,
}

impl CheckoutMetrics {
    pub fn new() -> Self {
        Self {
            orders_created: AtomicU64::new(0),
            order_failures: AtomicU64::new(0),
            polls_started: AtomicU64::new(0),
            paid: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            poll_errors: AtomicU64::new(0),
            polls_cancelled: AtomicU64::new(0),
        }
    }

    pub fn increment_orders_created(&self) {
        self.orders_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_order_failures(&self) {
        self.order_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_polls_started(&self) {
        self.polls_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_paid(&self) {
        self.paid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_timeouts(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_poll_errors(&self) {
        self.poll_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_polls_cancelled(&self) {
        self.polls_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            orders_created: self.orders_created.load(Ordering::Relaxed),
            order_failures: self.order_failures.load(Ordering::Relaxed),
            polls_started: self.polls_started.load(Ordering::Relaxed),
            paid: self.paid.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            polls_cancelled: self.polls_cancelled.load(Ordering::Relaxed),
        }
    }

    /// Share of started polls that ended paid, as a percentage.
    pub fn conversion_rate(&self) -> f64 {
        let started = self.polls_started.load(Ordering::Relaxed);
        if started == 0 {
            return 0.0;
        }
        (self.paid.load(Ordering::Relaxed) as f64 / started as f64) * 100.0
    }
}

impl Default for CheckoutMetrics {
    fn default() -> Self {
        Self::new()
    }
}
