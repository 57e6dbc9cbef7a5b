//! # Source Credibility
//!
//! Maps where an event came from to a trust bonus in `0..=15` points. The same number feeds
//! the quality score and breaks ties between duplicates.
//!
//! - Loads from JSON config (points + aliases).
//! - Case-insensitive lookup with normalization of punctuation, dashes, dots.
//! - Aliases map platform labels ("DIVA Magazine Events") to a canonical key ("api").
//! - Fallback order: alias → exact → substring → source kind → default.
//! - `trusted_sources`: exact source names whose discoveries skip review and land `approved`.

use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    fs,
    path::Path,
};

use crate::event::{Event, EventSource};

pub const ENV_CREDIBILITY_CONFIG_PATH: &str = "CREDIBILITY_CONFIG_PATH";
pub const DEFAULT_CREDIBILITY_CONFIG_PATH: &str = "config/credibility.json";

/// Upper bound of the credibility bonus.
pub const MAX_POINTS: u8 = 15;

#[derive(Debug, Clone, Deserialize)]
pub struct CredibilityTable {
    /// Points when nothing matches.
    #[serde(default = "default_default_points")]
    pub default_points: i32,
    /// Canonical key → points. Keys may be source kinds ("feed") or platform names.
    #[serde(default)]
    pub points: HashMap<String, i32>,
    /// Non-canonical name → canonical key.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
    /// Source names (normalized) routed straight to `approved`.
    #[serde(default)]
    pub trusted_sources: HashSet<String>,
}

const SEED_TRUSTED_SOURCES: [&str; 12] = [
    "DIVA Magazine Events",
    "Eventbrite UK - LGBTQ+",
    "qxmagazine.com",
    "ukblackpride.org.uk",
    "QX Magazine Events",
    "QX Magazine Feed",
    "stonewall.org.uk",
    "Consortium LGBT+",
    "community-submission",
    "Eventbrite API - BlackOutUK",
    "Outsavvy API",
    "Time Out London",
];

fn default_default_points() -> i32 {
    5
}

impl CredibilityTable {
    /// Load a JSON table. Keys are normalized so the file can use any casing.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading credibility table {}: {e}", path.display()))?;
        let raw: CredibilityTable = serde_json::from_str(&s)
            .map_err(|e| anyhow::anyhow!("parsing credibility table {}: {e}", path.display()))?;
        Ok(raw.normalized())
    }

    /// CREDIBILITY_CONFIG_PATH, then config/credibility.json, then the built-in seed.
    /// A broken file is logged and replaced by the seed rather than failing startup.
    pub fn load_default() -> Self {
        let path = std::env::var(ENV_CREDIBILITY_CONFIG_PATH)
            .unwrap_or_else(|_| DEFAULT_CREDIBILITY_CONFIG_PATH.to_string());
        if !Path::new(&path).exists() {
            return Self::default_seed();
        }
        match Self::load_from_file(&path) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(target: "pipeline", error = %e, "credibility table unusable, using seed");
                Self::default_seed()
            }
        }
    }

    fn normalized(self) -> Self {
        Self {
            default_points: self.default_points,
            points: self
                .points
                .into_iter()
                .map(|(k, v)| (normalize(&k), v))
                .collect(),
            aliases: self
                .aliases
                .into_iter()
                .map(|(k, v)| (normalize(&k), normalize(&v)))
                .collect(),
            trusted_sources: self.trusted_sources.iter().map(|s| normalize(s)).collect(),
        }
    }

    /// Whether discoveries from `source_name` bypass review. Exact name match only: a platform
    /// name appearing inside a search label does not make the search trusted.
    pub fn is_trusted_source(&self, source_name: Option<&str>) -> bool {
        source_name
            .map(normalize)
            .is_some_and(|n| self.trusted_sources.contains(&n))
    }

    /// Points for a provenance.
    ///
    /// 1. `source_name` alias → canonical → points.
    /// 2. `source_name` exact key.
    /// 3. Longest key appearing as whole words in `source_name` ("QX Magazine Feed" → "feed").
    /// 4. The `source` kind key ("admin-quick-add").
    /// 5. Default.
    pub fn points_for(&self, source_name: Option<&str>, source: EventSource) -> u8 {
        if let Some(name) = source_name.map(normalize).filter(|n| !n.is_empty()) {
            if let Some(&p) = self
                .aliases
                .get(&name)
                .and_then(|canon| self.points.get(canon))
            {
                return clamp_points(p);
            }
            if let Some(&p) = self.points.get(&name) {
                return clamp_points(p);
            }
            let padded = format!(" {name} ");
            if let Some((_, &p)) = self
                .points
                .iter()
                .filter(|(k, _)| padded.contains(&format!(" {k} ")))
                .max_by_key(|(k, _)| k.len())
            {
                return clamp_points(p);
            }
        }

        if let Some(&p) = self.points.get(&normalize(source.as_str())) {
            return clamp_points(p);
        }
        clamp_points(self.default_points)
    }

    pub fn points_for_event(&self, event: &Event) -> u8 {
        self.points_for(event.source_name.as_deref(), event.source)
    }

    /// Built-in table: source kinds plus the platforms the catalog has historically trusted.
    pub fn default_seed() -> Self {
        let mut points = HashMap::new();
        let mut aliases = HashMap::new();

        for (k, v) in [
            ("api", 15),
            ("admin-quick-add", 15),
            ("community-submission", 15),
            ("eventbrite", 15),
            ("outsavvy", 15),
            ("feed", 12),
            ("rss", 12),
            ("manual", 10),
            ("scrape", 8),
            ("search", 8),
            ("unknown", 5),
        ] {
            points.insert(normalize(k), v);
        }

        for (a, c) in [
            ("DIVA Magazine Events", "api"),
            ("Eventbrite UK - LGBTQ+", "api"),
            ("qxmagazine.com", "api"),
            ("QX Magazine Events", "api"),
            ("ukblackpride.org.uk", "api"),
            ("stonewall.org.uk", "api"),
            ("Consortium LGBT+", "api"),
            ("web scraping", "scrape"),
            ("web search", "search"),
            ("rss_feed", "feed"),
        ] {
            aliases.insert(normalize(a), normalize(c));
        }

        Self {
            default_points: 5,
            points,
            aliases,
            trusted_sources: SEED_TRUSTED_SOURCES.iter().map(|s| normalize(s)).collect(),
        }
    }
}

/// Lowercase, turn separators and dots into spaces, collapse runs of spaces.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();
    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['\n', '\r', '\t', '.', ',', ':', '|', '’', '\''], " ");
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clamp_points(p: i32) -> u8 {
    p.clamp(0, MAX_POINTS as i32) as u8
}
