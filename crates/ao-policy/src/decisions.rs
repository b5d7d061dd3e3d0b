use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use ao_domain::event::PolicyVerdict;
use ao_domain::risk::RiskLevel;

/// A single policy decision, kept for in-process observability
/// alongside the durable audit log.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub timestamp: DateTime<Utc>,
    pub call_id: String,
    pub tool_name: String,
    pub risk: RiskLevel,
    pub verdict: PolicyVerdict,
    pub reason: String,
}

/// Thread-safe ring buffer of the most recent policy decisions.
///
/// Uses `parking_lot::Mutex` for low-overhead synchronization. Evicts
/// the oldest entry once at capacity.
pub struct DecisionLog {
    inner: Mutex<VecDeque<Decision>>,
    capacity: usize,
}

impl DecisionLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, decision: Decision) {
        let mut buf = self.inner.lock();
        if buf.len() >= self.capacity {
            buf.pop_front();
        }
        buf.push_back(decision);
    }

    /// Return the `limit` most recent decisions, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Decision> {
        let buf = self.inner.lock();
        buf.iter().rev().take(limit).cloned().collect()
    }
}
