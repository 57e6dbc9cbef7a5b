//! Upstream adapters. Each provider either replays a fixture (tests) or talks HTTP.

pub mod feed;
pub mod reader;
pub mod search;

use std::time::Duration;

use crate::ingest::config::{DiscoveryConfig, SourceSpec};
use crate::ingest::types::SourceProvider;

pub use feed::{parse_feed, FeedProvider};
pub use reader::ReaderProvider;
pub use search::SearchProvider;

pub const ENV_SEARCH_API_KEY: &str = "SEARCH_API_KEY";

pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("community-events/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(target: "discovery", error = %e, "http client builder failed; using defaults");
            reqwest::Client::new()
        })
}

/// One HTTP provider per configured source.
pub fn providers_from_config(cfg: &DiscoveryConfig) -> Vec<Box<dyn SourceProvider>> {
    let client = http_client(cfg.fetch_timeout());
    let api_key = std::env::var(ENV_SEARCH_API_KEY).ok();
    cfg.sources
        .iter()
        .map(|spec| -> Box<dyn SourceProvider> {
            match spec {
                SourceSpec::Search {
                    name,
                    endpoint,
                    query,
                } => Box::new(SearchProvider::http(
                    name,
                    endpoint,
                    query,
                    api_key.clone(),
                    client.clone(),
                )),
                SourceSpec::Reader {
                    name,
                    reader_base,
                    url,
                } => Box::new(ReaderProvider::http(name, reader_base, url, client.clone())),
                SourceSpec::Feed { name, url } => {
                    Box::new(FeedProvider::http(name, url, client.clone()))
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_provider_per_source_named_after_it() {
        let cfg = DiscoveryConfig {
            sources: vec![
                SourceSpec::Search {
                    name: "Search: QTIPOC London".into(),
                    endpoint: "https://search.test".into(),
                    query: "qtipoc events london".into(),
                },
                SourceSpec::Feed {
                    name: "QX Magazine Feed".into(),
                    url: "https://qx.test/rss".into(),
                },
            ],
            ..DiscoveryConfig::default()
        };
        let names: Vec<String> = providers_from_config(&cfg)
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["Search: QTIPOC London", "QX Magazine Feed"]);
    }
}
