// tests/moderation.rs
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use community_events::audit::AuditLog;
use community_events::catalog::{
    CatalogError, CatalogStore, InMemoryCatalog, StatusChange, StatusFilter,
};
use community_events::event::{Event, EventSource, EventStatus};
use community_events::moderation::{ModerationError, Moderator};
use community_events::notify::{ModerationNotice, Notifier, NotifierMux};

fn setup() -> (Moderator, Arc<InMemoryCatalog>) {
    let store = Arc::new(InMemoryCatalog::new());
    let m = Moderator::new(store.clone(), Arc::new(AuditLog::default()));
    (m, store)
}

async fn insert(store: &InMemoryCatalog, title: &str, status: EventStatus) -> Event {
    let mut e = Event::new(title, EventSource::Search, "https://x.test/e", Utc::now());
    e.status = status;
    store.insert(e).await.unwrap()
}

#[tokio::test]
async fn scenario_d_publish_twice_returns_the_same_record() {
    let (m, store) = setup();
    let e = insert(&store, "Black Queer Social", EventStatus::Approved).await;

    let first = m.publish(&e.id).await.unwrap();
    let second = m.publish(&e.id).await.unwrap();

    assert_eq!(first.status, EventStatus::Published);
    assert_eq!(first, second);
    assert_eq!(store.len(), 1);
    let published = store
        .query(StatusFilter::Only(EventStatus::Published))
        .await
        .unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].id, e.id);
    // one transition recorded, not two
    assert_eq!(m.audit().for_event(&e.id).len(), 1);
}

#[tokio::test]
async fn full_review_path_records_who_and_when() {
    let (m, store) = setup();
    let e = insert(&store, "Trans Swim Social", EventStatus::Draft).await;

    m.submit(&e.id).await.unwrap();
    let r = m.begin_review(&e.id, "sam").await.unwrap();
    assert_eq!(r.status, EventStatus::Reviewing);
    assert_eq!(r.moderation.reviewed_by.as_deref(), Some("sam"));

    let a = m.approve(&e.id, "ade").await.unwrap();
    assert_eq!(a.status, EventStatus::Approved);
    assert_eq!(a.moderation.approved_by.as_deref(), Some("ade"));
    assert!(a.moderation.approved_at.is_some());

    let p = m.publish(&e.id).await.unwrap();
    assert!(p.moderation.published_at.is_some());

    let arch = m.archive(&e.id, "ade").await.unwrap();
    assert_eq!(arch.status, EventStatus::Archived);
    // archiving keeps the record
    assert_eq!(store.get(&e.id).await.unwrap().status, EventStatus::Archived);

    let trail: Vec<(EventStatus, EventStatus)> = m
        .audit()
        .for_event(&e.id)
        .iter()
        .map(|a| (a.from, a.to))
        .collect();
    assert_eq!(
        trail,
        vec![
            (EventStatus::Draft, EventStatus::Pending),
            (EventStatus::Pending, EventStatus::Reviewing),
            (EventStatus::Reviewing, EventStatus::Approved),
            (EventStatus::Approved, EventStatus::Published),
            (EventStatus::Published, EventStatus::Archived),
        ]
    );
}

#[tokio::test]
async fn publish_requires_approval() {
    let (m, store) = setup();
    let e = insert(&store, "Drag Brunch", EventStatus::Pending).await;
    let err = m.publish(&e.id).await.unwrap_err();
    assert!(matches!(
        err,
        ModerationError::InvalidTransition {
            from: EventStatus::Pending,
            to: EventStatus::Published,
            ..
        }
    ));
    assert_eq!(store.get(&e.id).await.unwrap().status, EventStatus::Pending);
}

#[tokio::test]
async fn rejection_needs_a_reason_and_keeps_it() {
    let (m, store) = setup();
    let e = insert(&store, "Estate Agents Breakfast", EventStatus::Reviewing).await;

    assert!(matches!(
        m.reject(&e.id, "sam", "   ").await,
        Err(ModerationError::MissingReason)
    ));
    assert!(matches!(
        m.reject(&e.id, "", "spam").await,
        Err(ModerationError::MissingActor)
    ));
    assert_eq!(store.get(&e.id).await.unwrap().status, EventStatus::Reviewing);

    let r = m.reject(&e.id, "sam", "not a community event").await.unwrap();
    assert_eq!(r.status, EventStatus::Rejected);
    assert_eq!(
        r.moderation.rejection_reason.as_deref(),
        Some("not a community event")
    );
    let audit = m.audit().for_event(&e.id);
    assert_eq!(audit[0].reason.as_deref(), Some("not a community event"));

    // rejected → archived still counts as rejected
    m.archive(&e.id, "sam").await.unwrap();
    let s = m.stats().await.unwrap();
    assert_eq!((s.rejected, s.archived, s.total), (1, 0, 1));
}

#[tokio::test]
async fn sweep_moves_only_dated_published_events_into_past() {
    let (m, store) = setup();
    let now = Utc::now();

    let mut old = Event::new("Last Week Poetry", EventSource::Api, "https://x.test/1", now);
    old.status = EventStatus::Published;
    old.date = now - Duration::days(7);
    let old = store.insert(old).await.unwrap();

    let mut upcoming = Event::new("Next Week Poetry", EventSource::Api, "https://x.test/2", now);
    upcoming.status = EventStatus::Published;
    upcoming.date = now + Duration::days(7);
    store.insert(upcoming).await.unwrap();

    let mut unconfirmed = Event::new("Unconfirmed Poetry", EventSource::Api, "https://x.test/3", now);
    unconfirmed.status = EventStatus::Published;
    unconfirmed.date = now - Duration::days(1);
    unconfirmed.date_is_placeholder = true;
    store.insert(unconfirmed).await.unwrap();

    let report = m.sweep_past(now).await.unwrap();
    assert_eq!(report.moved, 1);
    assert!(report.failed.is_empty());
    assert_eq!(store.get(&old.id).await.unwrap().status, EventStatus::Past);

    let s = m.stats().await.unwrap();
    assert_eq!((s.approved, s.archived), (2, 1));
}

/// Store whose status writes can be made to fail.
struct FlakyStore {
    inner: InMemoryCatalog,
    fail_writes: AtomicBool,
}

#[async_trait]
impl CatalogStore for FlakyStore {
    async fn insert(&self, event: Event) -> Result<Event, CatalogError> {
        self.inner.insert(event).await
    }
    async fn get(&self, id: &str) -> Result<Event, CatalogError> {
        self.inner.get(id).await
    }
    async fn query(&self, filter: StatusFilter) -> Result<Vec<Event>, CatalogError> {
        self.inner.query(filter).await
    }
    async fn update_status(&self, id: &str, change: StatusChange) -> Result<Event, CatalogError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("write rejected".into()));
        }
        self.inner.update_status(id, change).await
    }
}

#[tokio::test]
async fn failed_write_means_the_transition_did_not_happen_and_publish_can_retry() {
    let store = Arc::new(FlakyStore {
        inner: InMemoryCatalog::new(),
        fail_writes: AtomicBool::new(true),
    });
    let m = Moderator::new(store.clone(), Arc::new(AuditLog::default()));
    let mut e = Event::new("Queer Film Club", EventSource::Feed, "https://x.test/f", Utc::now());
    e.status = EventStatus::Approved;
    let e = store.insert(e).await.unwrap();

    let err = m.publish(&e.id).await.unwrap_err();
    assert!(matches!(err, ModerationError::Catalog(CatalogError::Unavailable(_))));
    assert_eq!(store.get(&e.id).await.unwrap().status, EventStatus::Approved);
    assert!(m.audit().for_event(&e.id).is_empty());

    store.fail_writes.store(false, Ordering::SeqCst);
    let p = m.publish(&e.id).await.unwrap();
    assert_eq!(p.status, EventStatus::Published);
}

struct Counting(Arc<AtomicUsize>);

#[async_trait]
impl Notifier for Counting {
    async fn send(&self, n: &ModerationNotice) -> anyhow::Result<()> {
        if matches!(n, ModerationNotice::Published { .. }) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
    fn name(&self) -> &'static str {
        "counting"
    }
}

#[tokio::test]
async fn publish_notice_is_sent_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let store = Arc::new(InMemoryCatalog::new());
    let m = Moderator::new(store.clone(), Arc::new(AuditLog::default())).with_notifier(Arc::new(
        NotifierMux::new().with(Box::new(Counting(hits.clone()))),
    ));
    let e = insert(&store, "Healing Circle", EventStatus::Approved).await;
    m.publish(&e.id).await.unwrap();
    m.publish(&e.id).await.unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_event_is_not_found() {
    let (m, _) = setup();
    assert!(matches!(
        m.approve("nope", "ade").await,
        Err(ModerationError::Catalog(CatalogError::NotFound(_)))
    ));
}
