use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-stage counters, cheap to clone and share with worker threads
#[derive(Debug, Clone)]
pub struct StageMetrics {
    /// Values pulled from upstream
    received: Arc<AtomicU64>,
    /// Values handed downstream
    forwarded: Arc<AtomicU64>,
    /// Values a predicate refused
    rejected: Arc<AtomicU64>,
    /// Values overwritten in a full buffer
    evicted: Arc<AtomicU64>,
    /// Non-empty buffer drains
    flushes: Arc<AtomicU64>,
    start_time: Instant,
}

impl StageMetrics {
    /// Create a new metrics collector for a stage
    pub fn new() -> Self {
        Self {
            received: Arc::new(AtomicU64::new(0)),
            forwarded: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
            evicted: Arc::new(AtomicU64::new(0)),
            flushes: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    /// Record a value pulled from upstream
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a value handed downstream
    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a value refused by a predicate
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a value overwritten in a full buffer
    pub fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a non-empty buffer drain
    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the number of values received
    pub fn total_received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Get the number of values forwarded
    pub fn total_forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Get the number of values rejected
    pub fn total_rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Get the number of values evicted
    pub fn total_evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Get the number of non-empty flushes
    pub fn total_flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.total_received(),
            forwarded: self.total_forwarded(),
            rejected: self.total_rejected(),
            evicted: self.total_evicted(),
            flushes: self.total_flushes(),
            elapsed: self.start_time.elapsed(),
        }
    }
}

impl Default for StageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub forwarded: u64,
    pub rejected: u64,
    pub evicted: u64,
    pub flushes: u64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    /// Format metrics as a human-readable string
    pub fn format(&self) -> String {
        format!(
            "Received: {}, Forwarded: {}, Rejected: {}, Evicted: {}, Flushes: {}, Elapsed: {:.2}s",
            self.received,
            self.forwarded,
            self.rejected,
            self.evicted,
            self.flushes,
            self.elapsed.as_secs_f64()
        )
    }
}
