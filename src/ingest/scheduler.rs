// src/ingest/scheduler.rs
use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, gauge};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ingest::config::DiscoveryConfig;
use crate::ingest::run_discovery;
use crate::ingest::types::SourceProvider;
use crate::moderation::Moderator;
use crate::notify::{ModerationNotice, NotifierMux};
use crate::pipeline::{BatchReport, Pipeline};

/// Everything one tick needs.
pub struct DiscoveryJob {
    pub cfg: DiscoveryConfig,
    pub providers: Arc<Vec<Box<dyn SourceProvider>>>,
    pub pipeline: Pipeline,
    pub moderator: Arc<Moderator>,
    pub notifier: Option<Arc<NotifierMux>>,
}

impl DiscoveryJob {
    /// One discovery run, its batch, and the past-event sweep.
    pub async fn tick(&self, cancel: &CancellationToken) -> Option<BatchReport> {
        let run = run_discovery(&self.providers, &self.cfg, cancel).await;
        let now = Utc::now();
        let report = match self.pipeline.ingest_run(run, now).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(target: "discovery", error = %e, "batch aborted");
                return None;
            }
        };

        if let Err(e) = self.moderator.sweep_past(now).await {
            tracing::warn!(target: "moderation", error = %e, "past sweep failed");
        }

        let awaiting = report.succeeded.saturating_sub(report.auto_approved);
        if awaiting > 0 {
            if let Some(n) = &self.notifier {
                n.notify(&ModerationNotice::AwaitingReview {
                    count: awaiting,
                    at: now,
                })
                .await;
            }
        }

        counter!("discovery_runs_total").increment(1);
        gauge!("discovery_last_batch_inserted").set(report.succeeded as f64);
        tracing::info!(
            target: "discovery",
            inserted = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            source_failures = report.source_failures.len(),
            "discovery tick"
        );
        Some(report)
    }
}

/// Run [`DiscoveryJob::tick`] every `cfg.interval()` until `cancel` fires.
/// The first tick runs immediately.
pub fn spawn_discovery_scheduler(job: DiscoveryJob, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(job.cfg.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    job.tick(&cancel).await;
                }
            }
        }
        tracing::info!(target: "discovery", "scheduler stopped");
    })
}
