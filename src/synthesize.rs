//! Candidate → `Event`.
//!
//! Everything produced here is a `draft` with quality 0; the pipeline tags and scores it.
//! Field extraction is heuristic and never fails the event: an unparsed date becomes the
//! placeholder, an unparsed location becomes [`LOCATION_TBD`].

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::event::{
    local_to_utc, CandidateRecord, Event, EventSource, KNOWN_CITIES, LOCATION_TBD,
    ONLINE_MARKERS,
};
use crate::ingest::extract::ScrapedTitle;
use crate::ingest::normalize_text;

/// Scraped titles shorter than this are section headings, not event names.
pub const MIN_SCRAPED_TITLE_LEN: usize = 10;

/// Placeholder date offset: "needs human date confirmation".
pub const PLACEHOLDER_DATE_DAYS: i64 = 7;

const MAX_MARKDOWN_DESCRIPTION: usize = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    #[error("candidate has no title")]
    MissingTitle,
    #[error("candidate has no url")]
    MissingUrl,
    #[error("title `{0}` is too short to be an event name")]
    TitleTooShort(String),
}

/// An RSS `<item>`, already unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published: Option<DateTime<Utc>>,
}

static RE_ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());
static RE_UK_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());
static RE_LONG_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:mon|tues|wednes|thurs|fri|satur|sun)day,?\s+(\d{1,2})(?:st|nd|rd|th)?\s+(january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{4})\b",
    )
    .unwrap()
});
static RE_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*(am|pm)?\b").unwrap());

static RE_LOCATION_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)\b(?:location|venue|address|where)\*{0,2}\s*:\*{0,2}[ \t]*([^\r\n]+)").unwrap()
});
static RE_AT_VENUE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\s*([^|]+?)\s*(?:\||$)").unwrap());
static RE_PLATFORM_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s*(?:eventbrite|outsavvy|meetup|tickets)\s*$").unwrap());
static RE_NOT_A_PLACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(?:tickets?|tbd|tba)$").unwrap());
static RE_CITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", KNOWN_CITIES.join("|"))).unwrap()
});
static RE_VENUE_BEFORE_CITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:\bat|@)\s+([^,|@]+?),?\s*$").unwrap());
static RE_IN_AT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:in|at)\s+([A-Z][A-Za-z ]+?)\s*(?:[,|]|$)").unwrap());
static RE_ONLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", ONLINE_MARKERS.join("|"))).unwrap()
});

static RE_ORGANIZER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)\b(?:organi[sz]er|organi[sz]ed by|hosted by)\*{0,2}\s*:?\*{0,2}[ \t]+([^\r\n]+)")
        .unwrap()
});
static RE_PRICE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:price|cost|fee)\s*:?\s*£?\s*(\d+(?:\.\d{2})?)").unwrap()
});
static RE_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"£\s?(\d+(?:\.\d{2})?)").unwrap());
/// "free" only in an admission sense: not "gluten-free", not "feel free to".
static RE_FREE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)\b(?:entry|admission|entrance|price|cost|tickets?)\s*(?:is|are|:)?\s*free\b|(?:^|[^\w-])free\s+(?:entry|admission|event|tickets?|of\s+charge|to\s+attend)\b|^\s*free\s*[.!]?\s*$",
    )
    .unwrap()
});
static RE_DONATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bdonation\b").unwrap());

/// Ticketing-app promotion appended to OutSavvy listings. Applied in order; the later, shorter
/// patterns mop up fragments the longer ones miss.
static RE_BOILERPLATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)Track your loved events in your profile or on the OutSavvy App[\s\S]*?Available on (?:the App Store|Google Play)(?:\s*Available on (?:the App Store|Google Play))?",
        r"(?i)Store your tickets securely on the app[^.]*\.?",
        r"(?i)Get app notifications when tickets go on sale[^.]*\.?",
        r"(?i)Browse and buy tickets on the go[^.]*\.?",
        r"(?i)Available on (?:the App Store|Google Play)[\s\S]*$",
        r"(?i)Download the OutSavvy app[^.]*\.?",
        r"(?i)Get the OutSavvy app[^.]*\.?",
        r"(?i)Track your loved events[^.]*\.?",
        r"(?i)Get notified when tickets go on sale[^.]*\.?",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

/// Search-result candidate → draft event.
pub fn from_candidate(
    c: &CandidateRecord,
    provider: &str,
    now: DateTime<Utc>,
) -> Result<Event, SynthesisError> {
    let mut ev = base_event(&c.title, &c.url, EventSource::Search, provider, now)?;
    let description = clean_description(&c.description);
    ev.description = if description.is_empty() {
        placeholder_description(&ev.title, &ev.source_url)
    } else {
        description
    };
    let context = format!("{}\n{}", c.description, c.raw_content);
    fill_from_text(&mut ev, &context, now);
    Ok(ev)
}

/// Heading/bold/link match from a scraped listing page → draft event.
pub fn from_scraped(
    t: &ScrapedTitle,
    page_url: &str,
    provider: &str,
    now: DateTime<Utc>,
) -> Result<Event, SynthesisError> {
    let title = normalize_text(&t.title);
    if title.chars().count() < MIN_SCRAPED_TITLE_LEN {
        return Err(SynthesisError::TitleTooShort(title));
    }
    let url = t.url.as_deref().unwrap_or(page_url);
    let mut ev = base_event(&title, url, EventSource::Scrape, provider, now)?;
    ev.description = placeholder_description(&ev.title, page_url);
    fill_from_text(&mut ev, "", now);
    Ok(ev)
}

/// RSS item → draft event. `pubDate` is only trusted as the event date when it is in the future.
pub fn from_feed_item(
    item: &FeedItem,
    provider: &str,
    now: DateTime<Utc>,
) -> Result<Event, SynthesisError> {
    let mut ev = base_event(&item.title, &item.link, EventSource::Feed, provider, now)?;
    let description = clean_description(&normalize_text(&item.description));
    ev.description = if description.is_empty() {
        placeholder_description(&ev.title, &ev.source_url)
    } else {
        description
    };
    let context = ev.description.clone();
    fill_from_text(&mut ev, &context, now);
    if ev.date_is_placeholder {
        if let Some(p) = item.published.filter(|p| *p > now) {
            ev.date = p;
            ev.date_is_placeholder = false;
        }
    }
    Ok(ev)
}

/// Fill gaps in `ev` from a reader-service detail page. Only unknown fields are overwritten;
/// the caller rescores.
pub fn enrich_from_markdown(ev: &mut Event, markdown: &str) {
    if ev.date_is_placeholder {
        if let Some(d) = extract_date(markdown) {
            ev.date = d;
            ev.date_is_placeholder = false;
        }
    }
    if !ev.has_known_location() {
        if let Some(loc) = labelled_location(markdown) {
            ev.location = loc;
        }
    }
    if ev.organizer.is_none() {
        ev.organizer = extract_organizer(markdown);
    }
    if ev.price.is_none() {
        ev.price = extract_price(markdown);
    }
    if ev.description.ends_with(PLACEHOLDER_DESCRIPTION_TAIL)
        || ev.description.chars().count() <= 50
    {
        if let Some(p) = first_paragraph(markdown)
            .map(|p| clean_description(&p))
            .filter(|p| !p.is_empty())
        {
            ev.description = p;
        }
    }
}

fn base_event(
    title: &str,
    url: &str,
    source: EventSource,
    provider: &str,
    now: DateTime<Utc>,
) -> Result<Event, SynthesisError> {
    let title = normalize_text(title);
    if title.is_empty() {
        return Err(SynthesisError::MissingTitle);
    }
    let url = url.trim();
    if url.is_empty() {
        return Err(SynthesisError::MissingUrl);
    }
    let mut ev = Event::new(title, source, url, now);
    ev.source_name = Some(platform_name(url).unwrap_or(provider).to_string());
    ev.date = placeholder_date(now);
    ev.date_is_placeholder = true;
    Ok(ev)
}

fn fill_from_text(ev: &mut Event, text: &str, now: DateTime<Utc>) {
    let haystack = format!("{}\n{}", ev.title, text);
    if let Some(d) = extract_date(&haystack) {
        ev.date = d;
        ev.date_is_placeholder = false;
    } else {
        ev.date = placeholder_date(now);
        ev.date_is_placeholder = true;
    }
    ev.location = extract_location(&ev.title, text).unwrap_or_else(|| LOCATION_TBD.to_string());
    ev.organizer = extract_organizer(text);
    ev.price = extract_price(text);
}

/// Strip ticketing-app promotion and collapse whitespace.
pub fn clean_description(text: &str) -> String {
    let mut cleaned = text.to_string();
    for re in RE_BOILERPLATE.iter() {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

const PLACEHOLDER_DESCRIPTION_TAIL: &str = "Full details available at source.";

pub fn placeholder_description(title: &str, url: &str) -> String {
    format!("{title}. Discovered from {url}. {PLACEHOLDER_DESCRIPTION_TAIL}")
}

pub fn placeholder_date(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(PLACEHOLDER_DATE_DAYS)
}

/// Ticketing platform label for credibility lookups.
fn platform_name(url: &str) -> Option<&'static str> {
    let u = url.to_ascii_lowercase();
    [("eventbrite", "Eventbrite"), ("outsavvy", "OutSavvy"), ("meetup", "Meetup")]
        .into_iter()
        .find(|(needle, _)| u.contains(needle))
        .map(|(_, label)| label)
}

/// First valid date in `text`: ISO, then DD/MM/YYYY, then "Saturday, 3 May 2025". The time of
/// day is the one written on the same line as that date (after it, else before it). Both are
/// read as London wall-clock time.
pub fn extract_date(text: &str) -> Option<DateTime<Utc>> {
    let (day, start, end) = first_date(text)?;
    let time = time_beside(text, start, end).unwrap_or(NaiveTime::MIN);
    Some(local_to_utc(day.and_time(time)))
}

/// Date plus the byte span it was read from.
fn first_date(text: &str) -> Option<(NaiveDate, usize, usize)> {
    let spanned = |c: &regex::Captures, d: Option<NaiveDate>| {
        let m = c.get(0)?;
        Some((d?, m.start(), m.end()))
    };
    RE_ISO_DATE
        .captures_iter(text)
        .find_map(|c| spanned(&c, ymd(&c[1], &c[2], &c[3])))
        .or_else(|| {
            RE_UK_DATE
                .captures_iter(text)
                .find_map(|c| spanned(&c, ymd(&c[3], &c[2], &c[1])))
        })
        .or_else(|| {
            RE_LONG_DATE.captures_iter(text).find_map(|c| {
                let m = MONTHS.iter().position(|m| c[2].eq_ignore_ascii_case(m))? + 1;
                spanned(&c, ymd(&c[3], &m.to_string(), &c[1]))
            })
        })
}

fn time_beside(text: &str, start: usize, end: usize) -> Option<NaiveTime> {
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[end..].find('\n').map_or(text.len(), |i| end + i);
    extract_time(&text[end..line_end]).or_else(|| extract_time(&text[line_start..start]))
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

fn extract_time(text: &str) -> Option<NaiveTime> {
    let c = RE_TIME.captures(text)?;
    let mut h: u32 = c[1].parse().ok()?;
    let min: u32 = c[2].parse().ok()?;
    match c.get(3).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
        Some("pm") if h < 12 => h += 12,
        Some("am") if h == 12 => h = 0,
        _ => {}
    }
    NaiveTime::from_hms_opt(h, min, 0)
}

fn clean_place(raw: &str) -> Option<String> {
    let place = RE_PLATFORM_SUFFIX.replace(raw.trim(), "").trim().to_string();
    (place.chars().count() > 3 && !RE_NOT_A_PLACE.is_match(&place)).then_some(place)
}

fn labelled_location(text: &str) -> Option<String> {
    RE_LOCATION_LABEL
        .captures(text)
        .and_then(|c| clean_place(&normalize_text(&c[1])))
}

/// Labels in the body first, then title conventions
/// (`Event @ Venue, City | ...`, online markers, known cities, `in/at Place`).
pub fn extract_location(title: &str, body: &str) -> Option<String> {
    if let Some(l) = labelled_location(body) {
        return Some(l);
    }
    if let Some(l) = RE_AT_VENUE.captures(title).and_then(|c| clean_place(&c[1])) {
        return Some(l);
    }
    if RE_ONLINE.is_match(title) {
        return Some("Online".to_string());
    }
    if let Some(m) = RE_CITY.find(title) {
        let city = m.as_str();
        let before = &title[..m.start()];
        let venue = RE_VENUE_BEFORE_CITY
            .captures(before)
            .map(|c| c[1].trim().to_string())
            .filter(|v| !v.is_empty());
        return Some(match venue {
            Some(v) => format!("{v}, {city}"),
            None => city.to_string(),
        });
    }
    if let Some(l) = RE_IN_AT.captures(title).and_then(|c| clean_place(&c[1])) {
        return Some(l);
    }
    RE_ONLINE.is_match(body).then(|| "Online".to_string())
}

pub fn extract_organizer(text: &str) -> Option<String> {
    let c = RE_ORGANIZER.captures(text)?;
    let name = normalize_text(&c[1]);
    let name: String = name.chars().take(100).collect();
    (!name.is_empty()).then_some(name)
}

/// `£12.50`, `Free` or `Donation`; `None` when nothing is stated.
pub fn extract_price(text: &str) -> Option<String> {
    if let Some(c) = RE_PRICE.captures(text) {
        return Some(pounds(&c[1]));
    }
    if RE_FREE.is_match(text) {
        return Some("Free".into());
    }
    if let Some(c) = RE_AMOUNT.captures(text) {
        return Some(pounds(&c[1]));
    }
    RE_DONATION.is_match(text).then(|| "Donation".into())
}

fn pounds(amount: &str) -> String {
    match amount.parse::<f64>() {
        Ok(v) if v == 0.0 => "Free".into(),
        _ => format!("£{amount}"),
    }
}

fn first_paragraph(markdown: &str) -> Option<String> {
    markdown
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.starts_with('#'))
        .map(normalize_text)
        .find(|p| p.chars().count() > 50)
        .map(|p| p.chars().take(MAX_MARKDOWN_DESCRIPTION).collect())
}
