//! Text extraction: search listings into candidate records, scraped markdown into title matches.
//!
//! Search responses look like
//! ```text
//! [1] Title: Black Queer Social
//! [1] URL Source: https://x.test/e1
//! [1] Description: A community gathering ...
//! [2] Title: ...
//! ```
//! A segment is the run of consecutive lines tagged with the same `[N]`. Fields are only ever
//! read from inside their own segment.

use metrics::counter;
use once_cell::sync::Lazy;
use regex::{CaptureMatches, Regex};
use std::iter::Peekable;

use crate::event::CandidateRecord;
use crate::ingest::normalize_text;

/// Segments shorter than this (trimmed) are rejected before any field pattern runs.
pub const MIN_SEGMENT_LEN: usize = 50;

/// Per-page cap for scraped title matches.
pub const MAX_SCRAPED_PER_PAGE: usize = 10;

/// `[N]` at the start of a line, followed by a field label. A bracketed number anywhere else
/// (a citation inside a description) is text, not a boundary.
static RE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[ \t]*\[(\d+)\][ \t]*(?:Title|URL Source|Description|Published Time|Markdown Content):",
    )
    .unwrap()
});
static RE_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)\bTitle:[ \t]*([^\r\n]*)").unwrap());
static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)\bURL Source:[ \t]*([^\r\n]*)").unwrap());
static RE_DESC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)\bDescription:[ \t]*([^\r\n]*)").unwrap());

/// Lazy, single-pass iterator over the candidates in one search response.
pub struct SearchResults<'t> {
    text: &'t str,
    markers: Peekable<CaptureMatches<'static, 't>>,
    dropped: usize,
}

/// Iterate the candidate records contained in `text`.
pub fn search_results(text: &str) -> SearchResults<'_> {
    SearchResults {
        text,
        markers: RE_MARKER.captures_iter(text).peekable(),
        dropped: 0,
    }
}

impl<'t> SearchResults<'t> {
    /// Segments rejected so far (too short, or a field missing).
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Next `[N]`-delimited segment, or `None` at end of input.
    fn next_segment(&mut self) -> Option<&'t str> {
        let first = self.markers.next()?;
        let start = first.get(0)?.start();
        let n = first.get(1)?.as_str().to_string();

        while let Some(next) = self.markers.peek() {
            if next.get(1).map(|m| m.as_str()) == Some(n.as_str()) {
                self.markers.next();
            } else {
                break;
            }
        }
        let end = self
            .markers
            .peek()
            .and_then(|c| c.get(0))
            .map(|m| m.start())
            .unwrap_or(self.text.len());
        Some(&self.text[start..end])
    }

    fn drop_segment(&mut self) {
        self.dropped += 1;
        counter!("extract_dropped_total").increment(1);
    }
}

impl<'t> Iterator for SearchResults<'t> {
    type Item = CandidateRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let segment = self.next_segment()?;
            if segment.trim().chars().count() < MIN_SEGMENT_LEN {
                self.drop_segment();
                continue;
            }
            match parse_segment(segment) {
                Some(rec) => {
                    counter!("extract_candidates_total").increment(1);
                    return Some(rec);
                }
                None => self.drop_segment(),
            }
        }
    }
}

fn field(re: &Regex, segment: &str) -> Option<String> {
    let raw = re.captures(segment)?.get(1)?.as_str();
    let v = normalize_text(raw);
    (!v.is_empty()).then_some(v)
}

/// All three fields or nothing.
fn parse_segment(segment: &str) -> Option<CandidateRecord> {
    let title = field(&RE_TITLE, segment)?;
    let url = field(&RE_URL, segment)?;
    let description = field(&RE_DESC, segment)?;
    Some(CandidateRecord {
        title,
        url,
        description,
        raw_content: segment.trim().to_string(),
    })
}

/// Heading, bold or link text lifted from scraped page markdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedTitle {
    pub title: String,
    /// Present for `[title](url)` matches.
    pub url: Option<String>,
}

static RE_HEADINGS: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?m)^###[ \t]+(.+?)[ \t]*$").unwrap(),
        Regex::new(r"(?m)^##[ \t]+(.+?)[ \t]*$").unwrap(),
        Regex::new(r"(?m)^#[ \t]+(.+?)[ \t]*$").unwrap(),
    ]
});
static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
static RE_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\((https?://[^)\s]+)\)").unwrap());

/// Scan reader markdown for likely event titles: `###`, `##`, `#` headings, then bold text,
/// then links. Stops after [`MAX_SCRAPED_PER_PAGE`] matches. No length filter here; the
/// synthesizer decides what is too short to be an event name.
pub fn markdown_titles(markdown: &str) -> Vec<ScrapedTitle> {
    let mut out = Vec::new();

    let headings = RE_HEADINGS
        .iter()
        .flat_map(|re| re.captures_iter(markdown))
        .chain(RE_BOLD.captures_iter(markdown));
    for caps in headings {
        if out.len() >= MAX_SCRAPED_PER_PAGE {
            return out;
        }
        if let Some(m) = caps.get(1) {
            out.push(ScrapedTitle {
                title: normalize_text(m.as_str()),
                url: None,
            });
        }
    }

    for caps in RE_LINK.captures_iter(markdown) {
        if out.len() >= MAX_SCRAPED_PER_PAGE {
            break;
        }
        if let (Some(t), Some(u)) = (caps.get(1), caps.get(2)) {
            out.push(ScrapedTitle {
                title: normalize_text(t.as_str()),
                url: Some(u.as_str().to_string()),
            });
        }
    }
    out
}
