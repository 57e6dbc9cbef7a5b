// src/ingest/mod.rs
pub mod config;
pub mod csv_import;
pub mod extract;
pub mod providers;
pub mod scheduler;
pub mod types;

use crate::ingest::config::DiscoveryConfig;
use crate::ingest::types::{RawDocument, SourceProvider};
use futures::stream::{self, StreamExt};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_histogram!("discovery_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_histogram!("discovery_feed_parse_ms", "RSS parse time in milliseconds.");
        describe_counter!(
            "discovery_source_errors_total",
            "Sources that failed or timed out during a discovery run."
        );
        describe_counter!(
            "discovery_documents_total",
            "Raw documents returned by providers."
        );
        describe_gauge!(
            "discovery_last_run_ts",
            "Unix ts when a discovery run last finished."
        );
        describe_counter!(
            "extract_candidates_total",
            "Candidate records emitted by the text extractor."
        );
        describe_counter!(
            "extract_dropped_total",
            "Segments dropped as too short or missing a field."
        );
    });
}

/// Normalize text: decode entities, strip tags, straighten quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z][^>]*>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Curly quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap: 2000 chars
    if out.chars().count() > 2000 {
        out = out.chars().take(2000).collect();
    }

    out
}

/// A source that produced nothing usable this run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub reason: String,
    pub timed_out: bool,
}

/// Outcome of one discovery run. Always partial-success shaped.
#[derive(Debug, Default)]
pub struct DiscoveryRun {
    pub documents: Vec<RawDocument>,
    pub failures: Vec<SourceFailure>,
    /// Sources that answered (successfully or not) before the run ended.
    pub completed_sources: usize,
    /// True when the token fired before every source answered.
    pub cancelled: bool,
}

/// Fetch every provider with bounded concurrency and a per-fetch timeout.
///
/// A failing or slow source is recorded in `failures` and never retried within the run.
/// If `cancel` fires, in-flight fetches are dropped and documents already received are kept.
pub async fn run_discovery(
    providers: &[Box<dyn SourceProvider>],
    cfg: &DiscoveryConfig,
    cancel: &CancellationToken,
) -> DiscoveryRun {
    ensure_metrics_described();

    let timeout = cfg.fetch_timeout();
    let fetches = stream::iter(providers.iter())
        .map(|p| async move {
            let t0 = Instant::now();
            let res = tokio::time::timeout(timeout, p.fetch()).await;
            histogram!("discovery_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
            (p.name().to_string(), res)
        })
        .buffer_unordered(cfg.concurrency())
        .boxed()
        .take_until(cancel.cancelled());
    tokio::pin!(fetches);

    let mut run = DiscoveryRun::default();
    while let Some((source, res)) = fetches.next().await {
        run.completed_sources += 1;
        match res {
            Ok(Ok(mut docs)) => {
                counter!("discovery_documents_total").increment(docs.len() as u64);
                tracing::debug!(target: "discovery", %source, docs = docs.len(), "source ok");
                run.documents.append(&mut docs);
            }
            Ok(Err(e)) => {
                tracing::warn!(target: "discovery", error = ?e, %source, "source error");
                counter!("discovery_source_errors_total").increment(1);
                run.failures.push(SourceFailure {
                    source,
                    reason: format!("{e:#}"),
                    timed_out: false,
                });
            }
            Err(_) => {
                tracing::warn!(target: "discovery", %source, timeout_s = timeout.as_secs(), "source timed out");
                counter!("discovery_source_errors_total").increment(1);
                run.failures.push(SourceFailure {
                    source,
                    reason: format!("timed out after {}s", timeout.as_secs()),
                    timed_out: true,
                });
            }
        }
    }

    run.cancelled = run.completed_sources < providers.len() && cancel.is_cancelled();
    gauge!("discovery_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

    tracing::info!(
        target: "discovery",
        documents = run.documents.len(),
        failures = run.failures.len(),
        cancelled = run.cancelled,
        "discovery run finished"
    );
    run
}
