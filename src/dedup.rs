//! Duplicate detection and resolution across independently sourced listings.
//!
//! Two notions of "same event":
//! - strict key `(lowercase trimmed title, calendar date)`, used wherever a list must not
//!   double count (statistics, catalog queries);
//! - a fuzzy pair policy used before persistence: shared theme AND (same date OR same
//!   location token).
//!
//! Resolution discards the loser whole; fields are never merged.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use strsim::normalized_levenshtein;

use crate::credibility::CredibilityTable;
use crate::event::{is_known_location, Event, KNOWN_CITIES, ONLINE_MARKERS};
use crate::relevance::Taxonomy;

pub type StrictKey = (String, NaiveDate);

pub fn strict_key(e: &Event) -> StrictKey {
    (e.normalized_title(), e.day())
}

/// First event per strict key, input order preserved.
pub fn dedup_strict<'a, I>(events: I) -> Vec<&'a Event>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut seen = HashSet::new();
    events
        .into_iter()
        .filter(|e| seen.insert(strict_key(e)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateReason {
    /// Same source URL and same title: one listing seen twice.
    SameListing,
    /// Same strict key.
    SameKey,
    ThemeAndDate,
    ThemeAndLocation,
}

#[derive(Debug, Clone)]
pub struct Discarded {
    pub loser: Event,
    pub winner_id: String,
    pub reason: DuplicateReason,
}

#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub kept: Vec<Event>,
    pub discarded: Vec<Discarded>,
}

/// Tuning for the fuzzy policy.
#[derive(Clone, Debug)]
pub struct DedupParams {
    /// Normalized Levenshtein in [0.0, 1.0]; titles at or above count as the same theme.
    pub title_similarity: f64,
}

impl Default for DedupParams {
    fn default() -> Self {
        Self {
            title_similarity: 0.85,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Deduplicator {
    taxonomy: Arc<Taxonomy>,
    credibility: Arc<CredibilityTable>,
    params: DedupParams,
}

impl Deduplicator {
    pub fn new(taxonomy: Arc<Taxonomy>, credibility: Arc<CredibilityTable>) -> Self {
        Self {
            taxonomy,
            credibility,
            params: DedupParams::default(),
        }
    }

    pub fn with_params(mut self, mut params: DedupParams) -> Self {
        params.title_similarity = params.title_similarity.clamp(0.0, 1.0);
        self.params = params;
        self
    }

    fn shares_theme(&self, a: &Event, b: &Event) -> bool {
        let ta: BTreeSet<&str> = self.taxonomy.themes_in(&a.title).into_iter().collect();
        if self
            .taxonomy
            .themes_in(&b.title)
            .iter()
            .any(|t| ta.contains(t))
        {
            return true;
        }
        normalized_levenshtein(&a.normalized_title(), &b.normalized_title())
            >= self.params.title_similarity
    }

    /// Symmetric: `duplicate_reason(a, b) == duplicate_reason(b, a)`.
    pub fn duplicate_reason(&self, a: &Event, b: &Event) -> Option<DuplicateReason> {
        let url_a = a.source_url.trim();
        if !url_a.is_empty()
            && url_a == b.source_url.trim()
            && a.normalized_title() == b.normalized_title()
        {
            return Some(DuplicateReason::SameListing);
        }
        if strict_key(a) == strict_key(b) {
            return Some(DuplicateReason::SameKey);
        }
        if !self.shares_theme(a, b) {
            return None;
        }
        // Placeholder dates say nothing about when the event happens.
        if !a.date_is_placeholder && !b.date_is_placeholder && a.day() == b.day() {
            return Some(DuplicateReason::ThemeAndDate);
        }
        let la = location_tokens(&a.location);
        if location_tokens(&b.location).iter().any(|t| la.contains(t)) {
            return Some(DuplicateReason::ThemeAndLocation);
        }
        None
    }

    pub fn is_duplicate(&self, a: &Event, b: &Event) -> bool {
        self.duplicate_reason(a, b).is_some()
    }

    /// True when `challenger` should replace `incumbent`: higher credibility, then higher
    /// quality, then earlier creation. Full ties keep the incumbent.
    pub fn challenger_wins(&self, incumbent: &Event, challenger: &Event) -> bool {
        let key = |e: &Event| {
            (
                self.credibility.points_for_event(e),
                e.quality_score,
                std::cmp::Reverse(e.created_at),
            )
        };
        key(challenger) > key(incumbent)
    }

    /// Collapse duplicates until none remain. Running it again on `kept` is a no-op.
    pub fn dedup(&self, events: Vec<Event>) -> DedupOutcome {
        let mut current = events;
        let mut discarded = Vec::new();

        loop {
            let mut kept: Vec<Event> = Vec::with_capacity(current.len());
            let mut collapsed = false;

            for ev in current {
                let hit = kept
                    .iter()
                    .enumerate()
                    .find_map(|(i, k)| self.duplicate_reason(k, &ev).map(|r| (i, r)));
                match hit {
                    None => kept.push(ev),
                    Some((i, reason)) => {
                        collapsed = true;
                        let loser = if self.challenger_wins(&kept[i], &ev) {
                            std::mem::replace(&mut kept[i], ev)
                        } else {
                            ev
                        };
                        tracing::debug!(
                            target: "pipeline",
                            winner = %kept[i].id,
                            loser = %loser.id,
                            ?reason,
                            "duplicate discarded"
                        );
                        discarded.push(Discarded {
                            winner_id: kept[i].id.clone(),
                            loser,
                            reason,
                        });
                    }
                }
            }

            current = kept;
            if !collapsed {
                break;
            }
        }

        DedupOutcome {
            kept: current,
            discarded,
        }
    }

    /// First event in `existing` that `candidate` duplicates.
    pub fn find_duplicate<'a>(
        &self,
        candidate: &Event,
        existing: &'a [Event],
    ) -> Option<(&'a Event, DuplicateReason)> {
        existing
            .iter()
            .find_map(|e| self.duplicate_reason(e, candidate).map(|r| (e, r)))
    }
}

/// Comparable location tokens: `online` for any virtual marker, and `venue:<name>` for the
/// part before the first comma unless it is just a city.
pub fn location_tokens(location: &str) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    if !is_known_location(location) {
        return out;
    }
    let lower = location.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    if words.iter().any(|w| ONLINE_MARKERS.contains(w)) {
        out.insert("online".to_string());
        return out;
    }
    let venue = lower
        .split(',')
        .next()
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let is_city = KNOWN_CITIES.iter().any(|c| c.eq_ignore_ascii_case(&venue));
    if !venue.is_empty() && !is_city && venue != "uk" {
        out.insert(format!("venue:{venue}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventSource;
    use chrono::{TimeZone, Utc};

    fn dd() -> Deduplicator {
        Deduplicator::new(
            Arc::new(Taxonomy::default_seed()),
            Arc::new(CredibilityTable::default_seed()),
        )
    }

    fn ev(title: &str, ymd: (i32, u32, u32), location: &str, source: EventSource) -> Event {
        let date = Utc.with_ymd_and_hms(ymd.0, ymd.1, ymd.2, 18, 0, 0).unwrap();
        let mut e = Event::new(title, source, format!("https://{}.test", title.len()), date);
        e.date = date;
        e.location = location.into();
        e
    }

    #[test]
    fn location_tokens_normalize_virtual_and_venues() {
        assert_eq!(
            location_tokens("Virtual (Zoom)"),
            BTreeSet::from(["online".to_string()])
        );
        assert_eq!(
            location_tokens("Rich Mix, Bethnal Green Road, London"),
            BTreeSet::from(["venue:rich mix".to_string()])
        );
        assert!(location_tokens("London").is_empty());
        assert!(location_tokens("Location TBD").is_empty());
    }

    #[test]
    fn different_themes_same_day_are_distinct() {
        let d = dd();
        let a = ev("Black Queer Poetry Night", (2025, 5, 1), "Rich Mix", EventSource::Search);
        let b = ev("Black Queer Film Club", (2025, 5, 1), "Rich Mix", EventSource::Search);
        assert_eq!(d.duplicate_reason(&a, &b), None);
    }

    #[test]
    fn theme_plus_venue_matches_across_dates() {
        let d = dd();
        let a = ev("Poetry Open Mic", (2025, 5, 1), "Rich Mix, London", EventSource::Search);
        let b = ev("QTIPOC Poetry Slam", (2025, 5, 8), "Rich Mix", EventSource::Search);
        assert_eq!(
            d.duplicate_reason(&a, &b),
            Some(DuplicateReason::ThemeAndLocation)
        );
    }

    #[test]
    fn placeholder_dates_do_not_count_as_same_day() {
        let d = dd();
        let mut a = ev("Healing Circle", (2025, 5, 1), "Hackney", EventSource::Search);
        let mut b = ev("Healing Walk", (2025, 5, 1), "Peckham", EventSource::Search);
        a.date_is_placeholder = true;
        b.date_is_placeholder = true;
        assert_eq!(d.duplicate_reason(&a, &b), None);
    }

    #[test]
    fn same_listing_wins_over_differing_dates() {
        let d = dd();
        let a = ev("Trans Joy Picnic", (2025, 5, 1), "Location TBD", EventSource::Search);
        let mut b = ev("trans  joy picnic", (2025, 6, 1), "Location TBD", EventSource::Search);
        b.source_url = a.source_url.clone();
        assert_eq!(d.duplicate_reason(&a, &b), Some(DuplicateReason::SameListing));
    }

    #[test]
    fn credibility_then_quality_then_age() {
        let d = dd();
        let mut feed = ev("Healing Circle", (2025, 5, 1), "Online", EventSource::Feed);
        let mut scrape = ev("Healing Circle", (2025, 5, 1), "Online", EventSource::Scrape);
        scrape.quality_score = 90;
        feed.quality_score = 10;
        assert!(d.challenger_wins(&scrape, &feed));
        assert!(!d.challenger_wins(&feed, &scrape));

        let mut other = feed.clone();
        other.quality_score = 11;
        assert!(d.challenger_wins(&feed, &other));

        let mut older = feed.clone();
        older.created_at = feed.created_at - chrono::Duration::hours(1);
        assert!(d.challenger_wins(&feed, &older));
        assert!(!d.challenger_wins(&feed, &feed.clone()));
    }

    #[test]
    fn dedup_reaches_a_fixpoint() {
        let d = dd();
        let events = vec![
            ev("Healing Circle", (2025, 5, 1), "Online", EventSource::Scrape),
            ev("Poetry Night", (2025, 5, 2), "Brixton House", EventSource::Search),
            ev("Healing Workshop", (2025, 5, 1), "Virtual", EventSource::Feed),
            ev("Healing Circle", (2025, 5, 1), "Online", EventSource::Api),
        ];
        let out = d.dedup(events);
        assert_eq!(out.kept.len(), 2);
        assert_eq!(out.discarded.len(), 2);
        let winner = out.kept.iter().find(|e| e.title.starts_with("Healing")).unwrap();
        assert_eq!(winner.source, EventSource::Api);
        // the feed listing beat the scrape, then lost to the api one
        assert_eq!(out.discarded[0].loser.source, EventSource::Scrape);
        assert_eq!(out.discarded[1].winner_id, winner.id);

        let again = d.dedup(out.kept.clone());
        assert!(again.discarded.is_empty());
        assert_eq!(again.kept, out.kept);
    }

    #[test]
    fn strict_dedup_keeps_first_per_key() {
        let a = ev("Pride Picnic", (2025, 6, 1), "Online", EventSource::Search);
        let mut b = ev("  pride picnic ", (2025, 6, 1), "Online", EventSource::Feed);
        b.date = a.date + chrono::Duration::hours(2);
        let c = ev("Pride Picnic", (2025, 6, 2), "Online", EventSource::Search);
        let all = vec![a.clone(), b, c];
        let out = dedup_strict(&all);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, a.id);
    }
}
