// src/relevance.rs
//! Relevance gate: versioned, tiered keyword taxonomy, substring scoring, and a
//! shared handle that can hot-reload the taxonomy file in dev.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::info;

use crate::event::Event;

// --- env defaults & names ---
pub const DEFAULT_TAXONOMY_CONFIG_PATH: &str = "config/taxonomy.toml";
pub const DEFAULT_MIN_MATCHES: usize = 1;

pub const ENV_TAXONOMY_CONFIG_PATH: &str = "TAXONOMY_CONFIG_PATH";
pub const ENV_MIN_MATCHES: &str = "RELEVANCE_MIN_MATCHES";

/// True when a dev-only env switch is on AND we run in a dev environment
/// (debug build, or SHUTTLE_ENV in {local, development, dev}).
pub(crate) fn dev_flag_enabled(var: &str) -> bool {
    let on = std::env::var(var).ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("SHUTTLE_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

pub(crate) fn dev_logging_enabled() -> bool {
    dev_flag_enabled("PIPELINE_DEV_LOG")
}

/// Short sha256 prefix so dev logs can correlate items without carrying their text.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

fn dev_log_relevance(event: &str, text: &str, rel: &Relevance, min_matches: usize) {
    if !dev_logging_enabled() {
        return;
    }
    let id = anon_hash(text);
    let matched: Vec<&str> = rel.matched.iter().take(5).map(|m| m.keyword.as_str()).collect();
    // Never log raw text. Only hashed id + short lists.
    info!(
        target: "relevance",
        %id, event, min_matches,
        count = rel.matched.len(),
        matched = ?matched,
        reasons = ?rel.reasons
    );
}

// parse optional positive integer env, clamp to >=1
fn parse_min_matches_env(raw: Option<String>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .map(|v| v.max(1))
}

/* ----------------------------
Taxonomy schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    /// Terms specific enough to pass the gate on their own, whatever the mode.
    HighValue,
    Umbrella,
    Identity,
    Community,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tier {
    pub kind: TierKind,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Taxonomy {
    pub version: String,
    #[serde(default = "default_min_matches")]
    pub min_matches: usize,
    /// Ordered; a keyword listed in two tiers belongs to the first.
    pub tiers: Vec<Tier>,
    /// Topic words ("poetry", "healing") used by the deduplicator's theme check.
    #[serde(default)]
    pub themes: Vec<String>,
}

fn default_min_matches() -> usize {
    DEFAULT_MIN_MATCHES
}

/// One keyword found in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    pub keyword: String,
    pub tier: TierKind,
}

/// Result of relevance evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Relevance {
    pub matched: Vec<KeywordMatch>,
    pub passed: bool,
    pub reasons: Vec<String>,
}

impl Relevance {
    pub fn count(&self) -> usize {
        self.matched.len()
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.matched.iter().map(|m| m.keyword.as_str())
    }

    pub fn has_high_value(&self) -> bool {
        self.matched.iter().any(|m| m.tier == TierKind::HighValue)
    }
}

impl Taxonomy {
    /// Load from a TOML file. Uses TAXONOMY_CONFIG_PATH or defaults to "config/taxonomy.toml";
    /// falls back to the built-in seed when neither exists.
    pub fn from_toml() -> anyhow::Result<Self> {
        let path = taxonomy_path();
        let mut tax = if path.exists() {
            Self::from_path(&path)?
        } else {
            tracing::warn!(target: "relevance", path = %path.display(), "taxonomy file missing, using built-in seed");
            Self::default_seed()
        };

        if let Some(n) = parse_min_matches_env(std::env::var(ENV_MIN_MATCHES).ok()) {
            tax.min_matches = n;
        }
        Ok(tax)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read taxonomy config at {}: {}", path.display(), e)
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from a TOML string. Keywords are lowercased, trimmed and de-duplicated across tiers.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let mut tax: Taxonomy = toml::from_str(toml_str)?;
        if tax.tiers.iter().all(|t| t.keywords.is_empty()) {
            anyhow::bail!("taxonomy `{}` has no keywords", tax.version);
        }
        tax.min_matches = tax.min_matches.max(1);

        let mut seen = std::collections::HashSet::new();
        for tier in &mut tax.tiers {
            tier.keywords = std::mem::take(&mut tier.keywords)
                .into_iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty() && seen.insert(k.clone()))
                .collect();
        }
        tax.themes = std::mem::take(&mut tax.themes)
            .into_iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Ok(tax)
    }

    /// Built-in taxonomy used when no config file is present.
    pub fn default_seed() -> Self {
        Self::from_toml_str(SEED_TAXONOMY).expect("built-in taxonomy parses")
    }

    /// Copy with a different gate threshold (clamped to >=1).
    pub fn with_min_matches(mut self, n: usize) -> Self {
        self.min_matches = n.max(1);
        self
    }

    /// Distinct keywords contained (as substrings) in `text`, in taxonomy order.
    /// Substring, not word-boundary: "qtibpoc" matches "bpoc".
    pub fn matches(&self, text: &str) -> Vec<KeywordMatch> {
        let lower = text.to_lowercase();
        self.tiers
            .iter()
            .flat_map(|t| t.keywords.iter().map(move |k| (t.kind, k)))
            .filter(|(_, k)| lower.contains(k.as_str()))
            .map(|(tier, k)| KeywordMatch {
                keyword: k.clone(),
                tier,
            })
            .collect()
    }

    /// Themes present in `title` as whole words or phrases.
    pub fn themes_in(&self, title: &str) -> Vec<&str> {
        let words: Vec<String> = title
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        let joined = format!(" {} ", words.join(" "));
        self.themes
            .iter()
            .filter(|t| joined.contains(&format!(" {t} ")))
            .map(String::as_str)
            .collect()
    }

    /// Count-based gate. Zero matches never pass. In strict mode (>=2) a single
    /// high-value term still passes.
    pub fn score(&self, text: &str) -> Relevance {
        let matched = self.matches(text);
        let mut rel = Relevance {
            matched,
            passed: false,
            reasons: Vec::new(),
        };

        if rel.matched.is_empty() {
            rel.reasons.push("no_keywords".into());
            dev_log_relevance("gated_out", text, &rel, self.min_matches);
            return rel;
        }

        if rel.count() >= self.min_matches {
            rel.passed = true;
            rel.reasons.push(format!("min_matches_ok:{}", self.min_matches));
        } else if rel.has_high_value() {
            rel.passed = true;
            rel.reasons.push("high_value_term".into());
        } else {
            rel.reasons.push(format!(
                "min_matches_fail:{}<{}",
                rel.count(),
                self.min_matches
            ));
        }

        dev_log_relevance(
            if rel.passed { "passed" } else { "gated_out" },
            text,
            &rel,
            self.min_matches,
        );
        rel
    }
}

/// Scores events against one taxonomy snapshot.
#[derive(Debug, Clone)]
pub struct RelevanceScorer {
    taxonomy: Arc<Taxonomy>,
}

impl RelevanceScorer {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self { taxonomy }
    }

    pub fn taxonomy(&self) -> &Arc<Taxonomy> {
        &self.taxonomy
    }

    /// Score title + description without touching the event.
    pub fn evaluate(&self, event: &Event) -> Relevance {
        self.taxonomy
            .score(&format!("{} {}", event.title, event.description))
    }

    /// Score and record the matched keywords into `event.tags`.
    pub fn tag(&self, event: &mut Event) -> Relevance {
        let rel = self.evaluate(event);
        event
            .tags
            .extend(rel.keywords().map(str::to_string));
        rel
    }
}

/* ----------------------------
Thread-safe handle + hot reload
---------------------------- */

/// Shared taxonomy. Readers take an `Arc` snapshot so a whole batch sees one keyword set
/// even if a reload lands mid-run.
#[derive(Clone)]
pub struct TaxonomyHandle {
    inner: Arc<RwLock<Arc<Taxonomy>>>,
}

impl TaxonomyHandle {
    pub fn new(taxonomy: Taxonomy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(taxonomy))),
        }
    }

    pub fn snapshot(&self) -> Arc<Taxonomy> {
        match self.inner.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn scorer(&self) -> RelevanceScorer {
        RelevanceScorer::new(self.snapshot())
    }

    /// Swap in a new taxonomy; readers holding an old snapshot are unaffected.
    pub fn replace(&self, taxonomy: Taxonomy) {
        match self.inner.write() {
            Ok(mut g) => *g = Arc::new(taxonomy),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(taxonomy),
        }
    }
}

pub fn taxonomy_path() -> PathBuf {
    std::env::var(ENV_TAXONOMY_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_TAXONOMY_CONFIG_PATH))
}

/// Start a polling watcher on `path` (mtime every 2s) that reloads into `handle`.
/// No-op unless RELEVANCE_HOT_RELOAD=1 in a dev environment. A file that fails to parse
/// is ignored and the previous taxonomy stays live.
pub fn start_hot_reload_thread(handle: TaxonomyHandle, path: PathBuf) {
    if !dev_flag_enabled("RELEVANCE_HOT_RELOAD") {
        return;
    }

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => {
                        last_mtime = Some(mtime);
                        false
                    }
                    Some(prev) => mtime > prev,
                };
                if changed {
                    match Taxonomy::from_path(&path) {
                        Ok(mut tax) => {
                            if let Some(n) =
                                parse_min_matches_env(std::env::var(ENV_MIN_MATCHES).ok())
                            {
                                tax.min_matches = n;
                            }
                            info!(target: "relevance", version = %tax.version, "taxonomy reloaded");
                            handle.replace(tax);
                        }
                        Err(e) => {
                            tracing::warn!(target: "relevance", error = %e, "taxonomy reload rejected");
                        }
                    }
                    last_mtime = Some(mtime);
                }
            }
            thread::sleep(poll);
        }
    });
}

const SEED_TAXONOMY: &str = r#"
version = "seed-1"
min_matches = 1
themes = [
    "poetry", "healing", "wellness", "writing", "book club", "dance", "yoga",
    "meditation", "film", "music", "drag", "comedy", "karaoke", "football",
    "running", "hiking", "swimming", "spoken word", "support group", "mental health",
]

[[tiers]]
kind = "high_value"
keywords = ["qtipoc", "qtibpoc", "bpoc", "bipoc", "black lgb", "black queer", "queer poc"]

[[tiers]]
kind = "umbrella"
keywords = ["queer", "lgbtq", "lgbt", "lesbian", "gay", "bisexual", "trans", "transgender", "non-binary"]

[[tiers]]
kind = "identity"
keywords = [
    "people of colour", "people of color", "poc",
    "black", "african", "caribbean", "afro",
    "asian", "south asian", "east asian", "chinese", "indian",
    "middle eastern", "arab", "mixed heritage", "mixed race",
]

[[tiers]]
kind = "community"
keywords = ["community", "inclusive", "diversity", "intersectional"]
"#;

/* ----------------------------
Tests
---------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TOML: &str = r#"
version = "t1"

[[tiers]]
kind = "high_value"
keywords = ["qtipoc", "BPOC "]

[[tiers]]
kind = "umbrella"
keywords = ["queer", "trans"]

[[tiers]]
kind = "community"
keywords = ["community", "queer"]
"#;

    fn tax() -> Taxonomy {
        Taxonomy::from_toml_str(TEST_TOML).expect("load test taxonomy")
    }

    #[test]
    fn keywords_are_normalized_and_unique_across_tiers() {
        let t = tax();
        assert_eq!(t.tiers[0].keywords, vec!["qtipoc", "bpoc"]);
        assert_eq!(t.tiers[2].keywords, vec!["community"]);
        assert_eq!(t.min_matches, 1);
    }

    #[test]
    fn substring_matching_catches_compounds() {
        let t = tax();
        let r = t.score("Writing Club for QTIBPOC");
        assert!(r.passed);
        assert_eq!(r.keywords().collect::<Vec<_>>(), vec!["bpoc"]);
        assert!(r.has_high_value());
    }

    #[test]
    fn zero_matches_never_pass_even_at_min_one() {
        let r = tax().score("Quarterly budget meeting");
        assert!(!r.passed);
        assert!(r.matched.is_empty());
        assert_eq!(r.reasons, vec!["no_keywords".to_string()]);
    }

    #[test]
    fn strict_mode_needs_two_unless_high_value() {
        let t = tax().with_min_matches(2);
        assert!(!t.score("Trans swim night").passed);
        assert!(t.score("Trans community swim night").passed);
        assert!(t.score("QTIPOC swim night").passed);
    }

    #[test]
    fn empty_taxonomy_is_rejected() {
        let toml = "version = \"x\"\n[[tiers]]\nkind = \"umbrella\"\nkeywords = []\n";
        assert!(Taxonomy::from_toml_str(toml).is_err());
    }

    #[test]
    fn seed_has_themes_and_all_tiers() {
        let t = Taxonomy::default_seed();
        assert_eq!(t.tiers.len(), 4);
        assert_eq!(t.themes_in("Healing Circle"), vec!["healing"]);
        assert!(t.themes_in("Unhealing things").is_empty());
        assert_eq!(t.themes_in("Monthly Book Club!"), vec!["book club"]);
    }

    #[test]
    fn tagging_adds_matched_keywords() {
        let scorer = RelevanceScorer::new(Arc::new(tax()));
        let mut ev = Event::new(
            "Queer Community Picnic",
            crate::event::EventSource::Search,
            "https://x.test",
            chrono::Utc::now(),
        );
        let r = scorer.tag(&mut ev);
        assert!(r.passed);
        assert!(ev.tags.contains("queer"));
        assert!(ev.tags.contains("community"));
    }

    #[test]
    fn handle_snapshot_survives_replace() {
        let h = TaxonomyHandle::new(tax());
        let before = h.snapshot();
        h.replace(Taxonomy::default_seed());
        assert_eq!(before.version, "t1");
        assert_eq!(h.snapshot().version, "seed-1");
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        assert_eq!(anon_hash("abc"), anon_hash("abc"));
        assert_eq!(anon_hash("abc").len(), 12);
    }
}
