use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// Register descriptions for the pipeline and moderation series.
pub fn describe_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        crate::ingest::ensure_metrics_described();
        describe_counter!(
            "pipeline_gated_out_total",
            "Candidates dropped by the relevance gate."
        );
        describe_counter!(
            "pipeline_dedup_total",
            "Candidates discarded as duplicates (within a batch or of a catalogued event)."
        );
        describe_counter!("pipeline_inserted_total", "Events written to the catalog.");
        describe_counter!(
            "pipeline_outside_area_total",
            "Candidates dropped because the venue is outside the UK."
        );
        describe_counter!(
            "pipeline_auto_approved_total",
            "Discovered events from a trusted source that landed approved."
        );
        describe_counter!(
            "moderation_transitions_total",
            "Applied status transitions, labelled by target status."
        );
        describe_counter!(
            "moderation_swept_past_total",
            "Published events moved to past by the date sweep."
        );
        describe_counter!("discovery_runs_total", "Scheduled discovery ticks.");
        describe_gauge!(
            "discovery_last_batch_inserted",
            "Events inserted by the most recent scheduled tick."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if a recorder is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        describe_metrics();
        Ok(Self { handle })
    }

    /// `/metrics` in Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
