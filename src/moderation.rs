//! Moderation lifecycle.
//!
//! ```text
//! draft ─┬─> pending ─┬─> reviewing ─┬─> approved ──> published ─┬─> archived
//!        │            │              │                            └─> past
//!        └────────────┴──────────────┴─> rejected ──> archived
//! ```
//! Every transition is a compare-and-set write on the catalog; if the write fails the
//! event keeps its old status. Publishing is idempotent so it can be retried after a crash
//! between approval and publication.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::audit::{AuditEntry, AuditLog};
use crate::catalog::{CatalogError, CatalogStore, Stamp, StatusChange, StatusFilter};
use crate::dedup::dedup_strict;
use crate::event::{Event, EventStatus};
use crate::notify::{ModerationNotice, NotifierMux};

/// Actor recorded for automatic transitions.
pub const SYSTEM_ACTOR: &str = "system";

impl EventStatus {
    /// Allowed next states.
    pub fn successors(self) -> &'static [EventStatus] {
        use EventStatus::*;
        match self {
            Draft => &[Pending, Reviewing, Approved, Rejected],
            Pending => &[Reviewing, Approved, Rejected],
            Reviewing => &[Approved, Rejected],
            Approved => &[Published],
            Rejected => &[Archived],
            Published => &[Archived, Past],
            Archived | Past => &[],
        }
    }

    pub fn can_transition_to(self, to: EventStatus) -> bool {
        self.successors().contains(&to)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("event `{id}` cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: EventStatus,
        to: EventStatus,
    },
    #[error("a rejection reason is required")]
    MissingReason,
    #[error("an acting moderator is required")]
    MissingActor,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Counts over the strict-key deduplicated catalog. Buckets are disjoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ModerationStats {
    /// draft / pending / reviewing
    pub pending: usize,
    /// approved / published
    pub approved: usize,
    /// rejected, plus archived events that were archived after a rejection
    pub rejected: usize,
    /// archived after publication, plus past
    pub archived: usize,
    pub total: usize,
}

impl ModerationStats {
    pub fn from_events<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a Event>,
    {
        let mut s = Self::default();
        for e in dedup_strict(events) {
            s.total += 1;
            match e.status {
                EventStatus::Draft | EventStatus::Pending | EventStatus::Reviewing => {
                    s.pending += 1
                }
                EventStatus::Approved | EventStatus::Published => s.approved += 1,
                EventStatus::Rejected => s.rejected += 1,
                EventStatus::Archived if e.moderation.rejection_reason.is_some() => {
                    s.rejected += 1
                }
                EventStatus::Archived | EventStatus::Past => s.archived += 1,
            }
        }
        s
    }
}

#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub moved: usize,
    /// (event id, error)
    pub failed: Vec<(String, String)>,
}

pub struct Moderator {
    store: Arc<dyn CatalogStore>,
    audit: Arc<AuditLog>,
    notifier: Option<Arc<NotifierMux>>,
}

fn require_actor(actor: &str) -> Result<&str, ModerationError> {
    let a = actor.trim();
    if a.is_empty() {
        Err(ModerationError::MissingActor)
    } else {
        Ok(a)
    }
}

impl Moderator {
    pub fn new(store: Arc<dyn CatalogStore>, audit: Arc<AuditLog>) -> Self {
        Self {
            store,
            audit,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<NotifierMux>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    async fn transition(
        &self,
        id: &str,
        to: EventStatus,
        stamp: Stamp,
        actor: &str,
    ) -> Result<Event, ModerationError> {
        let current = self.store.get(id).await?;
        if !current.status.can_transition_to(to) {
            return Err(ModerationError::InvalidTransition {
                id: id.to_string(),
                from: current.status,
                to,
            });
        }
        let change = StatusChange {
            from: current.status,
            to,
            at: Utc::now(),
            stamp,
        };
        let updated = self.store.update_status(id, change.clone()).await?;

        self.audit.push(AuditEntry::from_change(id, &change, actor));
        counter!("moderation_transitions_total", "to" => to.as_str()).increment(1);
        info!(target: "moderation", %id, from = %change.from, %to, %actor, "status changed");
        Ok(updated)
    }

    async fn notify(&self, notice: ModerationNotice) {
        if let Some(n) = &self.notifier {
            n.notify(&notice).await;
        }
    }

    /// draft → pending
    pub async fn submit(&self, id: &str) -> Result<Event, ModerationError> {
        self.transition(id, EventStatus::Pending, Stamp::None, SYSTEM_ACTOR)
            .await
    }

    /// draft | pending → reviewing
    pub async fn begin_review(&self, id: &str, reviewer: &str) -> Result<Event, ModerationError> {
        let by = require_actor(reviewer)?;
        self.transition(
            id,
            EventStatus::Reviewing,
            Stamp::Reviewed { by: by.to_string() },
            by,
        )
        .await
    }

    /// in review → approved; records approver and time.
    pub async fn approve(&self, id: &str, approver: &str) -> Result<Event, ModerationError> {
        let by = require_actor(approver)?;
        self.transition(
            id,
            EventStatus::Approved,
            Stamp::Approved { by: by.to_string() },
            by,
        )
        .await
    }

    /// in review → rejected; the reason is kept on the record and in the audit log.
    pub async fn reject(
        &self,
        id: &str,
        moderator: &str,
        reason: &str,
    ) -> Result<Event, ModerationError> {
        let by = require_actor(moderator)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ModerationError::MissingReason);
        }
        let ev = self
            .transition(
                id,
                EventStatus::Rejected,
                Stamp::Rejected {
                    by: by.to_string(),
                    reason: reason.to_string(),
                },
                by,
            )
            .await?;
        self.notify(ModerationNotice::Rejected {
            event_id: ev.id.clone(),
            title: ev.title.clone(),
            by: by.to_string(),
            reason: reason.to_string(),
            at: ev.updated_at,
        })
        .await;
        Ok(ev)
    }

    /// approved → published. Publishing a published event returns it unchanged.
    pub async fn publish(&self, id: &str) -> Result<Event, ModerationError> {
        let current = self.store.get(id).await?;
        if current.status == EventStatus::Published {
            return Ok(current);
        }
        let ev = match self
            .transition(id, EventStatus::Published, Stamp::Published, SYSTEM_ACTOR)
            .await
        {
            Ok(ev) => ev,
            // lost a race with another publisher: same outcome
            Err(ModerationError::Catalog(CatalogError::Conflict {
                actual: EventStatus::Published,
                ..
            })) => return Ok(self.store.get(id).await?),
            Err(e) => return Err(e),
        };
        self.notify(ModerationNotice::Published {
            event_id: ev.id.clone(),
            title: ev.title.clone(),
            source_url: ev.source_url.clone(),
            at: ev.updated_at,
        })
        .await;
        Ok(ev)
    }

    /// rejected | published → archived. The record stays in the catalog.
    pub async fn archive(&self, id: &str, actor: &str) -> Result<Event, ModerationError> {
        let by = require_actor(actor)?;
        self.transition(id, EventStatus::Archived, Stamp::Archived, by)
            .await
    }

    /// Move published events whose (confirmed) date is before `now` to `past`.
    pub async fn sweep_past(&self, now: DateTime<Utc>) -> Result<SweepReport, ModerationError> {
        let published = self
            .store
            .query(StatusFilter::Only(EventStatus::Published))
            .await?;
        let mut report = SweepReport::default();
        for e in published
            .iter()
            .filter(|e| !e.date_is_placeholder && e.date < now)
        {
            match self
                .transition(&e.id, EventStatus::Past, Stamp::None, SYSTEM_ACTOR)
                .await
            {
                Ok(_) => report.moved += 1,
                Err(err) => report.failed.push((e.id.clone(), err.to_string())),
            }
        }
        counter!("moderation_swept_past_total").increment(report.moved as u64);
        if report.moved > 0 || !report.failed.is_empty() {
            info!(target: "moderation", moved = report.moved, failed = report.failed.len(), "past sweep");
        }
        Ok(report)
    }

    pub async fn stats(&self) -> Result<ModerationStats, ModerationError> {
        let all = self.store.query(StatusFilter::All).await?;
        Ok(ModerationStats::from_events(&all))
    }
}
