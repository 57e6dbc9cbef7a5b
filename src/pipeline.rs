//! Discovery output → catalog drafts.
//!
//! Per batch: synthesize, drop out-of-area listings, gate on relevance (tagging as a side
//! effect), route trusted sources to `approved`, score, collapse duplicates, drop anything
//! already in the catalog, insert. Every stage past synthesis works on
//! one taxonomy snapshot so a hot reload mid-batch cannot split the keyword set.

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, CatalogStore, StatusFilter};
use crate::credibility::CredibilityTable;
use crate::dedup::Deduplicator;
use crate::event::{Event, EventStatus};
use crate::ingest::extract::{markdown_titles, search_results};
use crate::ingest::providers::parse_feed;
use crate::ingest::types::{DocumentKind, RawDocument};
use crate::ingest::{DiscoveryRun, SourceFailure};
use crate::quality::QualityScorer;
use crate::relevance::{anon_hash, dev_logging_enabled, RelevanceScorer, TaxonomyHandle};
use crate::synthesize::{self, SynthesisError};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("catalog store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Outcome of one batch. Partial failure is data, not an error.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BatchReport {
    /// Events written to the catalog.
    pub succeeded: usize,
    /// Irrelevant, duplicate, or too generic to be an event.
    pub skipped: usize,
    /// Unparseable segments, invalid candidates and rejected writes.
    pub failed: usize,
    pub errors: Vec<String>,
    pub source_failures: Vec<SourceFailure>,
    pub inserted_ids: Vec<String>,
    pub gated_out: usize,
    pub duplicates: usize,
    /// Venue named a place outside the UK.
    pub outside_area: usize,
    /// Discovered events from a trusted source that skipped review.
    pub auto_approved: usize,
}

impl BatchReport {
    fn absorb(&mut self, other: BatchReport) {
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.errors.extend(other.errors);
        self.source_failures.extend(other.source_failures);
        self.inserted_ids.extend(other.inserted_ids);
        self.gated_out += other.gated_out;
        self.duplicates += other.duplicates;
        self.outside_area += other.outside_area;
        self.auto_approved += other.auto_approved;
    }
}

/// How a batch enters the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    /// Discovered: area filter and relevance gate apply. Lands as `draft`, or `approved` when
    /// the source is on the trusted list.
    Discovered,
    /// Admin import: no gate, lands as `approved`.
    Trusted,
}

#[derive(Clone)]
pub struct Pipeline {
    taxonomy: TaxonomyHandle,
    credibility: Arc<CredibilityTable>,
    store: Arc<dyn CatalogStore>,
}

impl Pipeline {
    pub fn new(
        taxonomy: TaxonomyHandle,
        credibility: Arc<CredibilityTable>,
        store: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            taxonomy,
            credibility,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Synthesize draft events from one raw document. Never fails as a whole.
    pub fn events_from_document(&self, doc: &RawDocument, now: DateTime<Utc>) -> (Vec<Event>, BatchReport) {
        let mut report = BatchReport::default();
        let mut events = Vec::new();
        let mut record = |res: Result<Event, SynthesisError>, report: &mut BatchReport| match res {
            Ok(ev) => events.push(ev),
            Err(SynthesisError::TitleTooShort(_)) => report.skipped += 1,
            Err(e) => {
                report.failed += 1;
                report.errors.push(format!("{}: {e}", doc.source_name));
            }
        };

        match &doc.kind {
            DocumentKind::Search => {
                let mut results = search_results(&doc.body);
                for c in results.by_ref() {
                    record(synthesize::from_candidate(&c, &doc.source_name, now), &mut report);
                }
                if results.dropped() > 0 {
                    report.failed += results.dropped();
                    report.errors.push(format!(
                        "{}: {} segment(s) could not be parsed",
                        doc.source_name,
                        results.dropped()
                    ));
                }
            }
            DocumentKind::Reader { page_url } => {
                for t in markdown_titles(&doc.body) {
                    record(
                        synthesize::from_scraped(&t, page_url, &doc.source_name, now),
                        &mut report,
                    );
                }
            }
            DocumentKind::Feed => match parse_feed(&doc.body) {
                Ok(items) => {
                    for it in &items {
                        record(synthesize::from_feed_item(it, &doc.source_name, now), &mut report);
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    report.errors.push(format!("{}: {e:#}", doc.source_name));
                }
            },
        }

        // A page that names exactly one event is that event's detail page.
        if let (DocumentKind::Reader { .. }, [only]) = (&doc.kind, events.as_mut_slice()) {
            synthesize::enrich_from_markdown(only, &doc.body);
        }
        (events, report)
    }

    /// Everything a discovery run returned, plus its per-source failures.
    pub async fn ingest_run(
        &self,
        run: DiscoveryRun,
        now: DateTime<Utc>,
    ) -> Result<BatchReport, PipelineError> {
        let mut report = self.ingest_documents(&run.documents, now).await?;
        report.source_failures = run.failures;
        Ok(report)
    }

    pub async fn ingest_documents(
        &self,
        docs: &[RawDocument],
        now: DateTime<Utc>,
    ) -> Result<BatchReport, PipelineError> {
        let mut report = BatchReport::default();
        let mut events = Vec::new();
        for doc in docs {
            let (mut evs, r) = self.events_from_document(doc, now);
            events.append(&mut evs);
            report.absorb(r);
        }
        report.absorb(self.admit(events, Admission::Discovered).await?);
        Ok(report)
    }

    /// Raw search/reader text pasted by an operator.
    pub async fn ingest_text(
        &self,
        source_name: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<BatchReport, PipelineError> {
        self.ingest_documents(&[RawDocument::search(source_name, text)], now)
            .await
    }

    /// Drafts that already went through synthesis.
    pub async fn process(&self, events: Vec<Event>) -> Result<BatchReport, PipelineError> {
        self.admit(events, Admission::Discovered).await
    }

    /// Admin import: no relevance gate, events land `approved`.
    pub async fn import_trusted(&self, events: Vec<Event>) -> Result<BatchReport, PipelineError> {
        self.admit(events, Admission::Trusted).await
    }

    async fn admit(
        &self,
        events: Vec<Event>,
        admission: Admission,
    ) -> Result<BatchReport, PipelineError> {
        let mut report = BatchReport::default();
        if events.is_empty() {
            return Ok(report);
        }

        let taxonomy = self.taxonomy.snapshot();
        let relevance = RelevanceScorer::new(taxonomy.clone());
        let quality = QualityScorer::new(self.credibility.clone()).with_taxonomy(taxonomy.clone());
        let dedup = Deduplicator::new(taxonomy.clone(), self.credibility.clone());

        let mut passed = Vec::with_capacity(events.len());
        for mut ev in events {
            if admission == Admission::Discovered && ev.is_outside_uk() {
                report.skipped += 1;
                report.outside_area += 1;
                counter!("pipeline_outside_area_total").increment(1);
                if dev_logging_enabled() {
                    debug!(target: "pipeline", id = %anon_hash(&ev.title), "outside area");
                }
                continue;
            }
            let rel = relevance.tag(&mut ev);
            if admission == Admission::Discovered && !rel.passed {
                report.skipped += 1;
                report.gated_out += 1;
                counter!("pipeline_gated_out_total").increment(1);
                if dev_logging_enabled() {
                    debug!(target: "pipeline", id = %anon_hash(&ev.title), "gated out");
                }
                continue;
            }
            match admission {
                Admission::Trusted => ev.status = EventStatus::Approved,
                Admission::Discovered
                    if self.credibility.is_trusted_source(ev.source_name.as_deref()) =>
                {
                    ev.status = EventStatus::Approved;
                }
                Admission::Discovered => {}
            }
            ev.rescore(&quality);
            passed.push(ev);
        }

        let outcome = dedup.dedup(passed);
        let collapsed = outcome.discarded.len();
        report.skipped += collapsed;
        report.duplicates += collapsed;
        counter!("pipeline_dedup_total").increment(collapsed as u64);

        let existing = self
            .store
            .query(StatusFilter::All)
            .await
            .map_err(|e| PipelineError::StoreUnavailable(e.to_string()))?;

        for ev in outcome.kept {
            if let Some((persisted, reason)) = dedup.find_duplicate(&ev, &existing) {
                debug!(target: "pipeline", existing = %persisted.id, ?reason, "already catalogued");
                report.skipped += 1;
                report.duplicates += 1;
                counter!("pipeline_dedup_total").increment(1);
                continue;
            }
            match self.store.insert(ev).await {
                Ok(saved) => {
                    if admission == Admission::Discovered && saved.status == EventStatus::Approved {
                        report.auto_approved += 1;
                        counter!("pipeline_auto_approved_total").increment(1);
                    }
                    report.succeeded += 1;
                    report.inserted_ids.push(saved.id);
                    counter!("pipeline_inserted_total").increment(1);
                }
                Err(CatalogError::Unavailable(msg)) => {
                    warn!(target: "pipeline", inserted = report.succeeded, "store went away mid-batch");
                    return Err(PipelineError::StoreUnavailable(msg));
                }
                Err(e) => {
                    report.failed += 1;
                    report.errors.push(e.to_string());
                }
            }
        }

        info!(
            target: "pipeline",
            taxonomy = %taxonomy.version,
            succeeded = report.succeeded,
            skipped = report.skipped,
            auto_approved = report.auto_approved,
            failed = report.failed,
            "batch admitted"
        );
        Ok(report)
    }
}
