//! Health records and the bounded retention window.
//!
//! Records are appended in arrival order and only ever evicted from the front.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::load_balancer::backend::BackendId;

/// One observed outcome.
#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub at: Instant,
    pub success: bool,
    /// Succeeded, but above the latency threshold for the backend's class.
    pub slow: bool,
    pub latency: Duration,
    pub backend: BackendId,
}

impl HealthRecord {
    /// Counts against the failure rate.
    pub fn is_bad(&self) -> bool {
        !self.success || self.slow
    }
}

/// Time-windowed, capacity-capped record log for a single backend.
#[derive(Debug)]
pub struct HealthWindow {
    records: VecDeque<HealthRecord>,
    retention: Duration,
    capacity: usize,
}

impl HealthWindow {
    pub fn new(retention: Duration, capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            retention,
            capacity: capacity.max(1),
        }
    }

    /// Append a record, evicting whatever fell out of the window.
    pub fn push(&mut self, record: HealthRecord) {
        self.evict_expired(record.at);
        self.records.push_back(record);
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }

    /// Drop records older than the retention window. Returns how many were evicted.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some(front) = self.records.front() {
            if now.saturating_duration_since(front.at) <= self.retention {
                break;
            }
            self.records.pop_front();
            evicted += 1;
        }
        evicted
    }

    pub fn failure_rate(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        let bad = self.records.iter().filter(|r| r.is_bad()).count();
        bad as f64 / self.records.len() as f64
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HealthRecord> {
        self.records.iter()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
