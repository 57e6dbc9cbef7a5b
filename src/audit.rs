//! audit.rs: capped in-memory log of applied status transitions.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::catalog::{Stamp, StatusChange};
use crate::event::EventStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub event_id: String,
    pub from: EventStatus,
    pub to: EventStatus,
    /// Moderator or "system" for sweeps.
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEntry {
    pub fn from_change(event_id: &str, change: &StatusChange, actor: &str) -> Self {
        let reason = match &change.stamp {
            Stamp::Rejected { reason, .. } => Some(reason.clone()),
            _ => None,
        };
        Self {
            at: change.at,
            event_id: event_id.to_string(),
            from: change.from,
            to: change.to,
            actor: actor.to_string(),
            reason,
        }
    }
}

#[derive(Debug)]
pub struct AuditLog {
    inner: Mutex<Vec<AuditEntry>>,
    cap: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::with_capacity(1_000)
    }
}

impl AuditLog {
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.clamp(1, 10_000);
        Self {
            inner: Mutex::new(Vec::with_capacity(cap)),
            cap,
        }
    }

    pub fn push(&self, entry: AuditEntry) {
        let mut v = self.inner.lock();
        v.push(entry);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<AuditEntry> {
        let v = self.inner.lock();
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }

    /// Every retained entry for one event, oldest first.
    pub fn for_event(&self, event_id: &str) -> Vec<AuditEntry> {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.event_id == event_id)
            .cloned()
            .collect()
    }
}
