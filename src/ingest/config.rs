// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DISCOVERY_CONFIG_PATH: &str = "DISCOVERY_CONFIG_PATH";

pub const DEFAULT_INTERVAL_SECS: u64 = 6 * 3600;
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 4;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// One configured upstream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    /// Search API; `query` is posted, results come back as `[N]` listings.
    Search {
        name: String,
        endpoint: String,
        query: String,
    },
    /// Reader service that renders `url` as markdown when prefixed with `reader_base`.
    Reader {
        name: String,
        reader_base: String,
        url: String,
    },
    /// Plain RSS 2.0 feed.
    Feed { name: String, url: String },
}

impl SourceSpec {
    pub fn name(&self) -> &str {
        match self {
            SourceSpec::Search { name, .. }
            | SourceSpec::Reader { name, .. }
            | SourceSpec::Feed { name, .. } => name,
        }
    }

    fn is_usable(&self) -> bool {
        let target = match self {
            SourceSpec::Search { endpoint, query, .. } => {
                !query.trim().is_empty() && !endpoint.trim().is_empty()
            }
            SourceSpec::Reader { reader_base, url, .. } => {
                !reader_base.trim().is_empty() && !url.trim().is_empty()
            }
            SourceSpec::Feed { url, .. } => !url.trim().is_empty(),
        };
        target && !self.name().trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_concurrency")]
    pub max_concurrent_fetches: usize,
    #[serde(default = "default_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}
fn default_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENT_FETCHES
}
fn default_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            sources: Vec::new(),
        }
    }
}

impl DiscoveryConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn concurrency(&self) -> usize {
        self.max_concurrent_fetches.max(1)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(60))
    }
}

/// Load discovery config from an explicit path. Supports TOML or JSON formats.
pub fn load_discovery_from(path: &Path) -> Result<DiscoveryConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading discovery config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_discovery(&content, ext.as_str())
        .with_context(|| format!("parsing discovery config {}", path.display()))
}

/// Load discovery config using env var + fallbacks:
/// 1) $DISCOVERY_CONFIG_PATH
/// 2) config/discovery.toml
/// 3) config/discovery.json
/// 4) built-in defaults (no sources)
pub fn load_discovery_default() -> Result<DiscoveryConfig> {
    if let Ok(p) = std::env::var(ENV_DISCOVERY_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_discovery_from(&pb);
        } else {
            return Err(anyhow!("DISCOVERY_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/discovery.toml");
    if toml_p.exists() {
        return load_discovery_from(&toml_p);
    }
    let json_p = PathBuf::from("config/discovery.json");
    if json_p.exists() {
        return load_discovery_from(&json_p);
    }
    Ok(DiscoveryConfig::default())
}

fn parse_discovery(s: &str, hint_ext: &str) -> Result<DiscoveryConfig> {
    let cfg: DiscoveryConfig = if hint_ext == "json" {
        serde_json::from_str(s)?
    } else {
        match toml::from_str(s) {
            Ok(c) => c,
            Err(toml_err) => serde_json::from_str(s)
                .map_err(|_| anyhow!("unsupported discovery config format: {toml_err}"))?,
        }
    };
    Ok(clean(cfg))
}

/// Drop unusable sources and repeated names (first one wins).
fn clean(mut cfg: DiscoveryConfig) -> DiscoveryConfig {
    let mut seen = std::collections::HashSet::new();
    cfg.sources.retain(|s| {
        let usable = s.is_usable();
        if !usable {
            tracing::warn!(target: "discovery", source = s.name(), "dropping unusable source entry");
        }
        usable && seen.insert(s.name().trim().to_ascii_lowercase())
    });
    cfg
}
