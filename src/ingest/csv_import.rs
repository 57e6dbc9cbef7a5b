//! Admin spreadsheet import. Rows are trusted: they skip the relevance gate and land `approved`.
//!
//! Columns: `name` (or `title` when `name` is absent or blank), `description`, `event_date`, `location`, `source_url`,
//! `organizer_name`, `tags` (comma separated), `price`. Unknown columns are ignored. Dates
//! without an offset are London wall-clock time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::io::Read;

use crate::event::{local_to_utc, Event, EventSource, LOCATION_TBD};
use crate::ingest::normalize_text;
use crate::pipeline::{BatchReport, Pipeline, PipelineError};
use crate::synthesize::extract_date;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    event_date: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    source_url: String,
    #[serde(default)]
    organizer_name: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    price: String,
}

/// Rows that parsed, plus the ones that did not.
#[derive(Debug, Default)]
pub struct ParsedCsv {
    pub events: Vec<Event>,
    pub failed: usize,
    pub errors: Vec<String>,
}

fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%d/%m/%Y %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(local_to_utc(ndt));
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(local_to_utc(d.and_time(chrono::NaiveTime::MIN)));
        }
    }
    extract_date(raw)
}

fn non_empty(s: &str) -> Option<String> {
    let v = normalize_text(s);
    (!v.is_empty()).then_some(v)
}

fn row_to_event(row: CsvRow, now: DateTime<Utc>) -> Result<Event, String> {
    let title = non_empty(&row.name)
        .or_else(|| non_empty(&row.title))
        .ok_or("missing name/title")?;
    let date = parse_event_date(&row.event_date)
        .ok_or_else(|| format!("unparseable event_date `{}`", row.event_date.trim()))?;

    let mut ev = Event::new(title, EventSource::AdminQuickAdd, row.source_url.trim(), now);
    ev.date = date;
    ev.description = non_empty(&row.description).unwrap_or_default();
    ev.location = non_empty(&row.location).unwrap_or_else(|| LOCATION_TBD.to_string());
    ev.organizer = non_empty(&row.organizer_name);
    ev.price = non_empty(&row.price);
    ev.tags = row
        .tags
        .split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    Ok(ev)
}

/// Parse every row; a bad row is counted and reported, never fatal.
pub fn parse_csv<R: Read>(reader: R, now: DateTime<Utc>) -> ParsedCsv {
    let mut out = ParsedCsv::default();
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    for (i, rec) in rdr.deserialize::<CsvRow>().enumerate() {
        // header is line 1
        let line = i + 2;
        match rec.map_err(|e| e.to_string()).and_then(|row| row_to_event(row, now)) {
            Ok(ev) => out.events.push(ev),
            Err(reason) => {
                tracing::warn!(target: "pipeline", line, %reason, "csv row rejected");
                out.failed += 1;
                out.errors.push(format!("line {line}: {reason}"));
            }
        }
    }
    out
}

/// Parse and admit a CSV export. Fails only when the catalog is unreachable.
pub async fn import_csv<R: Read>(
    reader: R,
    pipeline: &Pipeline,
    now: DateTime<Utc>,
) -> Result<BatchReport, PipelineError> {
    let parsed = parse_csv(reader, now);
    let mut report = pipeline.import_trusted(parsed.events).await?;
    report.failed += parsed.failed;
    report.errors.extend(parsed.errors);
    Ok(report)
}
