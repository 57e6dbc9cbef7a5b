//! event.rs: catalog entity, candidate record, provenance and lifecycle vocabulary.
//!
//! `Event` is the durable record that flows from the synthesizer into the catalog.
//! `CandidateRecord` is the transient output of the text extractor.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::quality::QualityScorer;

/// Listings are UK events: stated wall-clock times and calendar days are London time.
pub const CATALOG_TZ: Tz = chrono_tz::Europe::London;

/// London wall-clock time to UTC. A time inside the spring-forward gap lands an hour later.
pub fn local_to_utc(local: NaiveDateTime) -> DateTime<Utc> {
    CATALOG_TZ
        .from_local_datetime(&local)
        .earliest()
        .or_else(|| {
            CATALOG_TZ
                .from_local_datetime(&(local + Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local))
}

/// Sentinel for "we could not tell where this happens".
pub const LOCATION_TBD: &str = "Location TBD";

/// Organizer filler used by scraped listings; not a real organizer.
pub const GENERIC_ORGANIZER: &str = "Community Organizer";

/// Cities recognised in titles and locations.
pub const KNOWN_CITIES: [&str; 12] = [
    "London",
    "Manchester",
    "Birmingham",
    "Leeds",
    "Glasgow",
    "Edinburgh",
    "Liverpool",
    "Bristol",
    "Sheffield",
    "Newcastle",
    "Brighton",
    "Cardiff",
];

/// Location words meaning "no physical venue".
pub const ONLINE_MARKERS: [&str; 4] = ["online", "virtual", "zoom", "remote"];

/// UK places beyond [`KNOWN_CITIES`], matched as whole words.
pub const UK_PLACES: [&str; 13] = [
    "nottingham",
    "leicester",
    "oxford",
    "cambridge",
    "southampton",
    "belfast",
    "uk",
    "united kingdom",
    "england",
    "scotland",
    "wales",
    "northern ireland",
    "britain",
];

/// Places that put a listing outside the catalog's area when they end a venue line.
pub const NON_UK_PLACES: [&str; 30] = [
    "usa",
    "united states",
    "new york",
    "nyc",
    "brooklyn",
    "los angeles",
    "san francisco",
    "chicago",
    "canada",
    "toronto",
    "montreal",
    "australia",
    "sydney",
    "melbourne",
    "ireland",
    "dublin",
    "france",
    "paris",
    "germany",
    "berlin",
    "netherlands",
    "amsterdam",
    "spain",
    "madrid",
    "barcelona",
    "portugal",
    "lisbon",
    "italy",
    "belgium",
    "brussels",
];

/// Unvalidated extraction from raw search/reader text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub title: String,
    pub url: String,
    pub description: String,
    /// The whole segment the fields were taken from.
    pub raw_content: String,
}

/// Where an event was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventSource {
    Search,
    Scrape,
    Feed,
    Api,
    AdminQuickAdd,
    CommunitySubmission,
    Manual,
    Unknown,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::Search => "search",
            EventSource::Scrape => "scrape",
            EventSource::Feed => "feed",
            EventSource::Api => "api",
            EventSource::AdminQuickAdd => "admin-quick-add",
            EventSource::CommunitySubmission => "community-submission",
            EventSource::Manual => "manual",
            EventSource::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state. Each state has exactly one meaning; see `moderation` for the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Pending,
    Reviewing,
    Approved,
    Rejected,
    Published,
    Archived,
    Past,
}

impl EventStatus {
    pub const ALL: [EventStatus; 8] = [
        EventStatus::Draft,
        EventStatus::Pending,
        EventStatus::Reviewing,
        EventStatus::Approved,
        EventStatus::Rejected,
        EventStatus::Published,
        EventStatus::Archived,
        EventStatus::Past,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Draft => "draft",
            EventStatus::Pending => "pending",
            EventStatus::Reviewing => "reviewing",
            EventStatus::Approved => "approved",
            EventStatus::Rejected => "rejected",
            EventStatus::Published => "published",
            EventStatus::Archived => "archived",
            EventStatus::Past => "past",
        }
    }

    /// draft / pending / reviewing
    pub fn is_in_review(&self) -> bool {
        matches!(
            self,
            EventStatus::Draft | EventStatus::Pending | EventStatus::Reviewing
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventStatus::Archived | EventStatus::Past)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        EventStatus::ALL
            .iter()
            .copied()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown status `{s}`"))
    }
}

/// Who did what to the event, for audit continuity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<DateTime<Utc>>,
}

/// The durable catalog entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    /// True when `date` is the "needs human confirmation" default.
    #[serde(default)]
    pub date_is_placeholder: bool,
    pub location: String,
    pub source: EventSource,
    /// Provider label, e.g. "QX Magazine Feed".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub status: EventStatus,
    pub quality_score: u8,
    #[serde(default)]
    pub moderation: ModerationRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Bare event with defaults for everything but the identity fields.
    pub fn new(
        title: impl Into<String>,
        source: EventSource,
        source_url: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_id(now),
            title: title.into(),
            description: String::new(),
            date: now,
            date_is_placeholder: false,
            location: LOCATION_TBD.to_string(),
            source,
            source_name: None,
            source_url: source_url.into(),
            organizer: None,
            price: None,
            tags: BTreeSet::new(),
            status: EventStatus::Draft,
            quality_score: 0,
            moderation: ModerationRecord::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// False for the TBD sentinel, its spelling variants, and blank strings.
    pub fn has_known_location(&self) -> bool {
        is_known_location(&self.location)
    }

    /// Calendar day of the event in London.
    pub fn day(&self) -> NaiveDate {
        self.date.with_timezone(&CATALOG_TZ).date_naive()
    }

    /// Lowercased, trimmed title, whitespace collapsed.
    pub fn normalized_title(&self) -> String {
        self.title
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// Out of area: the last part of the venue line names a non-UK place and neither the
    /// location nor the description names a UK one. Unknown and online locations stay in.
    pub fn is_outside_uk(&self) -> bool {
        if !self.has_known_location() {
            return false;
        }
        let location = words(&self.location);
        if ONLINE_MARKERS.iter().any(|m| location.contains(&format!(" {m} "))) {
            return false;
        }
        let context = format!("{location}{}", words(&self.description));
        let names_uk = KNOWN_CITIES
            .iter()
            .chain(UK_PLACES.iter())
            .any(|p| context.contains(&format!(" {} ", p.to_lowercase())));
        if names_uk {
            return false;
        }
        let tail = words(self.location.rsplit(',').next().unwrap_or_default());
        NON_UK_PLACES.iter().any(|p| tail.contains(&format!(" {p} ")))
    }

    /// Recompute `quality_score` after any field mutation.
    pub fn rescore(&mut self, scorer: &QualityScorer) {
        self.quality_score = scorer.score(self);
        self.updated_at = Utc::now();
    }
}

pub fn is_known_location(location: &str) -> bool {
    let l = location.trim();
    if l.is_empty() {
        return false;
    }
    !matches!(
        l.to_ascii_lowercase().as_str(),
        "location tbd" | "location tba" | "tbd" | "tba" | "location unknown"
    )
}

/// Lowercase words separated and bracketed by single spaces, for whole-word `contains`.
fn words(text: &str) -> String {
    let joined = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    format!(" {joined} ")
}

/// `<unix millis><9 random base36 chars>`: unique without a central allocator.
pub fn generate_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("{}{}", now.timestamp_millis(), suffix)
}
