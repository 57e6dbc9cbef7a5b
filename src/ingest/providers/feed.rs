use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::histogram;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::normalize_text;
use crate::ingest::types::{DocumentKind, RawDocument, SourceProvider};
use crate::synthesize::FeedItem;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let dt = OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()?;
    DateTime::from_timestamp(dt.unix_timestamp(), 0)
}

/// Items lacking a title or link are skipped.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedItem>> {
    let t0 = std::time::Instant::now();
    let rss: Rss = from_str(&scrub_html_entities_for_xml(xml)).context("parsing rss xml")?;

    let items = rss
        .channel
        .item
        .into_iter()
        .filter_map(|it| {
            let title = normalize_text(it.title.as_deref()?);
            let link = it.link?.trim().to_string();
            if title.is_empty() || link.is_empty() {
                return None;
            }
            Some(FeedItem {
                title,
                link,
                description: it.description.unwrap_or_default(),
                published: it.pub_date.as_deref().and_then(parse_rfc2822),
            })
        })
        .collect();

    histogram!("discovery_feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(items)
}

pub struct FeedProvider {
    name: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl FeedProvider {
    pub fn from_fixture(name: &str, xml: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn http(name: &str, url: &str, client: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
        }
    }
}

#[async_trait]
impl SourceProvider for FeedProvider {
    async fn fetch(&self) -> Result<Vec<RawDocument>> {
        let body = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http { url, client } => client
                .get(url)
                .send()
                .await
                .with_context(|| format!("feed get ({url})"))?
                .error_for_status()
                .with_context(|| format!("feed non-2xx ({url})"))?
                .text()
                .await
                .context("feed .text()")?,
        };
        // Fail the source now rather than at synthesis time.
        parse_feed(&body).with_context(|| format!("feed `{}`", self.name))?;
        Ok(vec![RawDocument {
            source_name: self.name.clone(),
            kind: DocumentKind::Feed,
            body,
        }])
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// HTML entities that are not defined in XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&pound;", "£")
}
