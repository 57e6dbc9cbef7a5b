//! Catalog store contract and the bundled in-memory implementation.
//!
//! Status writes are compare-and-set: a `StatusChange` names the status it expects to
//! replace, and the whole record swap happens under one write lock, so readers never see
//! a half-applied transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::event::{Event, EventStatus};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("event `{0}` not found")]
    NotFound(String),
    #[error("event `{0}` already exists")]
    AlreadyExists(String),
    #[error("event `{id}` is {actual}, expected {expected}")]
    Conflict {
        id: String,
        expected: EventStatus,
        actual: EventStatus,
    },
    #[error("catalog store unavailable: {0}")]
    Unavailable(String),
}

/// Which events a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(EventStatus),
    /// draft / pending / reviewing
    InReview,
    /// approved / published
    Live,
}

impl StatusFilter {
    pub fn matches(&self, status: EventStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(s) => *s == status,
            StatusFilter::InReview => status.is_in_review(),
            StatusFilter::Live => {
                matches!(status, EventStatus::Approved | EventStatus::Published)
            }
        }
    }
}

impl std::str::FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(StatusFilter::All),
            "in_review" | "in-review" | "review" => Ok(StatusFilter::InReview),
            "live" => Ok(StatusFilter::Live),
            other => other.parse::<EventStatus>().map(StatusFilter::Only),
        }
    }
}

/// Audit metadata applied together with a status write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stamp {
    None,
    Reviewed { by: String },
    Approved { by: String },
    Rejected { by: String, reason: String },
    Published,
    Archived,
}

/// A single compare-and-set status transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub from: EventStatus,
    pub to: EventStatus,
    pub at: DateTime<Utc>,
    pub stamp: Stamp,
}

impl StatusChange {
    /// Copy of `event` with the change applied. Does not check `from`.
    pub fn apply_to(&self, event: &Event) -> Event {
        let mut e = event.clone();
        e.status = self.to;
        e.updated_at = self.at;
        let m = &mut e.moderation;
        match &self.stamp {
            Stamp::None => {}
            Stamp::Reviewed { by } => m.reviewed_by = Some(by.clone()),
            Stamp::Approved { by } => {
                m.approved_by = Some(by.clone());
                m.approved_at = Some(self.at);
            }
            Stamp::Rejected { by, reason } => {
                m.rejected_by = Some(by.clone());
                m.rejection_reason = Some(reason.clone());
                m.rejected_at = Some(self.at);
            }
            Stamp::Published => m.published_at = Some(self.at),
            Stamp::Archived => m.archived_at = Some(self.at),
        }
        e
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert(&self, event: Event) -> Result<Event, CatalogError>;
    async fn get(&self, id: &str) -> Result<Event, CatalogError>;
    async fn query(&self, filter: StatusFilter) -> Result<Vec<Event>, CatalogError>;
    /// Applies `change` only if the stored status still equals `change.from`.
    async fn update_status(&self, id: &str, change: StatusChange) -> Result<Event, CatalogError>;
}

/// `HashMap` behind a `parking_lot` lock. `set_available(false)` simulates an outage.
#[derive(Debug)]
pub struct InMemoryCatalog {
    events: RwLock<HashMap<String, Event>>,
    available: AtomicBool,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), CatalogError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(CatalogError::Unavailable("in-memory catalog switched off".into()))
        }
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn insert(&self, event: Event) -> Result<Event, CatalogError> {
        self.check()?;
        let mut g = self.events.write();
        if g.contains_key(&event.id) {
            return Err(CatalogError::AlreadyExists(event.id));
        }
        g.insert(event.id.clone(), event.clone());
        Ok(event)
    }

    async fn get(&self, id: &str) -> Result<Event, CatalogError> {
        self.check()?;
        self.events
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    async fn query(&self, filter: StatusFilter) -> Result<Vec<Event>, CatalogError> {
        self.check()?;
        let mut out: Vec<Event> = self
            .events
            .read()
            .values()
            .filter(|e| filter.matches(e.status))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn update_status(&self, id: &str, change: StatusChange) -> Result<Event, CatalogError> {
        self.check()?;
        let mut g = self.events.write();
        let current = g
            .get(id)
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
        if current.status != change.from {
            return Err(CatalogError::Conflict {
                id: id.to_string(),
                expected: change.from,
                actual: current.status,
            });
        }
        let updated = change.apply_to(current);
        g.insert(id.to_string(), updated.clone());
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventSource;

    fn draft(title: &str) -> Event {
        Event::new(title, EventSource::Manual, "https://x.test", Utc::now())
    }

    #[tokio::test]
    async fn insert_get_query_roundtrip() {
        let c = InMemoryCatalog::new();
        let e = c.insert(draft("Queer Book Swap")).await.unwrap();
        assert_eq!(c.get(&e.id).await.unwrap().title, "Queer Book Swap");
        assert!(matches!(
            c.insert(e.clone()).await,
            Err(CatalogError::AlreadyExists(_))
        ));
        assert_eq!(c.query(StatusFilter::InReview).await.unwrap().len(), 1);
        assert!(c.query(StatusFilter::Live).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_from_is_a_conflict_and_changes_nothing() {
        let c = InMemoryCatalog::new();
        let e = c.insert(draft("Trans Swim Night")).await.unwrap();
        let change = StatusChange {
            from: EventStatus::Approved,
            to: EventStatus::Published,
            at: Utc::now(),
            stamp: Stamp::Published,
        };
        let err = c.update_status(&e.id, change).await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict { actual: EventStatus::Draft, .. }));
        let stored = c.get(&e.id).await.unwrap();
        assert_eq!(stored.status, EventStatus::Draft);
        assert!(stored.moderation.published_at.is_none());
    }

    #[tokio::test]
    async fn unavailable_store_rejects_everything() {
        let c = InMemoryCatalog::new();
        c.set_available(false);
        assert!(matches!(
            c.insert(draft("Healing Circle")).await,
            Err(CatalogError::Unavailable(_))
        ));
        assert!(c.query(StatusFilter::All).await.is_err());
    }

    #[test]
    fn filter_parsing() {
        assert_eq!("".parse::<StatusFilter>(), Ok(StatusFilter::All));
        assert_eq!("live".parse::<StatusFilter>(), Ok(StatusFilter::Live));
        assert_eq!(
            "Published".parse::<StatusFilter>(),
            Ok(StatusFilter::Only(EventStatus::Published))
        );
        assert!("cancelled".parse::<StatusFilter>().is_err());
    }
}
