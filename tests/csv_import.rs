// tests/csv_import.rs
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use community_events::catalog::{CatalogStore, InMemoryCatalog, StatusFilter};
use community_events::credibility::CredibilityTable;
use community_events::event::{EventSource, EventStatus};
use community_events::ingest::csv_import::import_csv;
use community_events::pipeline::Pipeline;
use community_events::relevance::{Taxonomy, TaxonomyHandle};

const EXPORT: &str = "\
name,description,event_date,location,source_url,organizer_name,tags,price
Allotment Open Day,Seed swap and tea,2025-06-01 11:00,Hackney,https://x.test/allot,Grow Together,\"gardening, outdoors\",Free
,No name on this row,2025-06-02,,,,,
Queer Tango,Lesson then social,sometime soon,Brixton,https://x.test/tango,,,£8
Trans Swim Social,Evening swim,14/06/2025 19:30,London Fields Lido,https://x.test/swim,,trans,£5
";

#[tokio::test]
async fn admin_export_lands_approved_and_bad_rows_are_counted() {
    let store = Arc::new(InMemoryCatalog::new());
    let p = Pipeline::new(
        TaxonomyHandle::new(Taxonomy::default_seed()),
        Arc::new(CredibilityTable::default_seed()),
        store.clone(),
    );

    let r = import_csv(EXPORT.as_bytes(), &p, Utc::now()).await.unwrap();
    assert_eq!(r.succeeded, 2, "{r:?}");
    assert_eq!(r.failed, 2);
    assert_eq!(r.gated_out, 0);
    assert!(r.errors.iter().any(|e| e.starts_with("line 3:")));
    assert!(r.errors.iter().any(|e| e.starts_with("line 4:")));

    let all = store.query(StatusFilter::All).await.unwrap();
    assert!(all.iter().all(|e| e.status == EventStatus::Approved));
    assert!(all.iter().all(|e| e.source == EventSource::AdminQuickAdd));

    // no relevance keywords, imported anyway
    let allot = all.iter().find(|e| e.title == "Allotment Open Day").unwrap();
    // 11:00 BST
    assert_eq!(allot.date, Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap());
    assert_eq!(allot.organizer.as_deref(), Some("Grow Together"));
    assert!(allot.tags.contains("gardening"));
    assert!(!allot.date_is_placeholder);
}
