// tests/discovery.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use community_events::ingest::config::DiscoveryConfig;
use community_events::ingest::run_discovery;
use community_events::ingest::types::{RawDocument, SourceProvider};
use tokio_util::sync::CancellationToken;

enum Behaviour {
    Ok,
    Fail,
    Sleep(Duration),
}

struct Mock {
    name: String,
    behaviour: Behaviour,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Mock {
    fn boxed(name: &str, behaviour: Behaviour) -> Box<dyn SourceProvider> {
        Self::tracked(name, behaviour, Arc::default(), Arc::default())
    }

    fn tracked(
        name: &str,
        behaviour: Behaviour,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    ) -> Box<dyn SourceProvider> {
        Box::new(Self {
            name: name.to_string(),
            behaviour,
            in_flight,
            peak,
        })
    }
}

#[async_trait]
impl SourceProvider for Mock {
    async fn fetch(&self) -> Result<Vec<RawDocument>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let out = match &self.behaviour {
            Behaviour::Ok => Ok(()),
            Behaviour::Fail => Err(anyhow!("upstream said 500")),
            Behaviour::Sleep(d) => {
                tokio::time::sleep(*d).await;
                Ok(())
            }
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out?;
        Ok(vec![RawDocument::search(&self.name, "[1] Title: x")])
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn cfg(concurrency: usize, timeout_secs: u64) -> DiscoveryConfig {
    DiscoveryConfig {
        max_concurrent_fetches: concurrency,
        fetch_timeout_secs: timeout_secs,
        ..DiscoveryConfig::default()
    }
}

#[tokio::test]
async fn one_failing_source_does_not_sink_the_run() {
    let providers = vec![
        Mock::boxed("good-1", Behaviour::Ok),
        Mock::boxed("broken", Behaviour::Fail),
        Mock::boxed("good-2", Behaviour::Ok),
    ];
    let run = run_discovery(&providers, &cfg(4, 5), &CancellationToken::new()).await;
    assert_eq!(run.documents.len(), 2);
    assert_eq!(run.failures.len(), 1);
    assert_eq!(run.failures[0].source, "broken");
    assert!(run.failures[0].reason.contains("500"));
    assert!(!run.failures[0].timed_out);
    assert_eq!(run.completed_sources, 3);
    assert!(!run.cancelled);
}

#[tokio::test(start_paused = true)]
async fn slow_source_times_out_and_is_recorded() {
    let providers = vec![
        Mock::boxed("fast", Behaviour::Ok),
        Mock::boxed("slow", Behaviour::Sleep(Duration::from_secs(120))),
    ];
    let run = run_discovery(&providers, &cfg(2, 2), &CancellationToken::new()).await;
    assert_eq!(run.documents.len(), 1);
    assert_eq!(run.failures.len(), 1);
    assert_eq!(run.failures[0].source, "slow");
    assert!(run.failures[0].timed_out);
}

#[tokio::test(start_paused = true)]
async fn cancellation_keeps_documents_already_received() {
    let providers = vec![
        Mock::boxed("fast", Behaviour::Ok),
        Mock::boxed("stuck", Behaviour::Sleep(Duration::from_secs(600))),
    ];
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let run = run_discovery(&providers, &cfg(2, 3600), &cancel).await;
    assert!(run.cancelled);
    assert_eq!(run.completed_sources, 1);
    assert_eq!(run.documents.len(), 1);
    assert_eq!(run.documents[0].source_name, "fast");
    assert!(run.failures.is_empty());
}

#[tokio::test(start_paused = true)]
async fn concurrent_fetches_never_exceed_the_bound() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let providers: Vec<_> = (0..8)
        .map(|i| {
            Mock::tracked(
                &format!("p{i}"),
                Behaviour::Sleep(Duration::from_millis(100)),
                in_flight.clone(),
                peak.clone(),
            )
        })
        .collect();

    let run = run_discovery(&providers, &cfg(3, 10), &CancellationToken::new()).await;
    assert_eq!(run.documents.len(), 8);
    assert_eq!(peak.load(Ordering::SeqCst), 3);
}
