//! Advisory completeness/trust score, 0..=100. Used for triage and duplicate tie-breaks,
//! never as a gate.

use std::sync::Arc;

use crate::credibility::CredibilityTable;
use crate::event::{Event, GENERIC_ORGANIZER};
use crate::relevance::Taxonomy;

pub const MAX_SCORE: u8 = 100;

const PRICE_PLACEHOLDERS: [&str; 4] = ["", "tbd", "tba", "see event page"];

#[derive(Debug, Clone)]
pub struct QualityScorer {
    credibility: Arc<CredibilityTable>,
    /// Lets "any tag present" count taxonomy hits before the tagging stage has run.
    taxonomy: Option<Arc<Taxonomy>>,
}

/// Per-signal points, mostly for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualityBreakdown {
    pub title: u8,
    pub description: u8,
    pub date: u8,
    pub location: u8,
    pub organizer: u8,
    pub source_url: u8,
    pub price: u8,
    pub tags: u8,
    pub credibility: u8,
}

impl QualityBreakdown {
    pub fn total(&self) -> u8 {
        let sum: u16 = [
            self.title,
            self.description,
            self.date,
            self.location,
            self.organizer,
            self.source_url,
            self.price,
            self.tags,
            self.credibility,
        ]
        .iter()
        .map(|&p| p as u16)
        .sum();
        sum.min(MAX_SCORE as u16) as u8
    }
}

impl QualityScorer {
    pub fn new(credibility: Arc<CredibilityTable>) -> Self {
        Self {
            credibility,
            taxonomy: None,
        }
    }

    pub fn with_taxonomy(mut self, taxonomy: Arc<Taxonomy>) -> Self {
        self.taxonomy = Some(taxonomy);
        self
    }

    pub fn credibility(&self) -> &CredibilityTable {
        &self.credibility
    }

    pub fn breakdown(&self, e: &Event) -> QualityBreakdown {
        let has_tags = !e.tags.is_empty()
            || self.taxonomy.as_ref().is_some_and(|t| {
                !t.matches(&format!("{} {}", e.title, e.description))
                    .is_empty()
            });

        QualityBreakdown {
            title: points(e.title.trim().chars().count() > 10, 20),
            description: points(e.description.trim().chars().count() > 50, 15),
            date: points(!e.date_is_placeholder, 15),
            location: points(e.has_known_location(), 10),
            organizer: points(
                e.organizer
                    .as_deref()
                    .map(str::trim)
                    .is_some_and(|o| !o.is_empty() && !o.eq_ignore_ascii_case(GENERIC_ORGANIZER)),
                10,
            ),
            source_url: points(is_http_url(&e.source_url), 10),
            price: points(
                e.price
                    .as_deref()
                    .is_some_and(|p| !PRICE_PLACEHOLDERS.contains(&p.trim().to_lowercase().as_str())),
                5,
            ),
            tags: points(has_tags, 5),
            credibility: self.credibility.points_for_event(e),
        }
    }

    pub fn score(&self, e: &Event) -> u8 {
        self.breakdown(e).total()
    }
}

fn points(cond: bool, p: u8) -> u8 {
    if cond {
        p
    } else {
        0
    }
}

/// `http://` or `https://` followed by a host.
pub(crate) fn is_http_url(url: &str) -> bool {
    let u = url.trim();
    let rest = u
        .strip_prefix("https://")
        .or_else(|| u.strip_prefix("http://"));
    rest.is_some_and(|r| {
        r.split(['/', '?', '#'])
            .next()
            .is_some_and(|host| !host.is_empty() && !host.contains(char::is_whitespace))
    })
}
