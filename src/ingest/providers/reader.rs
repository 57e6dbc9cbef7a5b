use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::ingest::types::{DocumentKind, RawDocument, SourceProvider};

/// Fetches one listing page through a reader service that returns markdown.
pub struct ReaderProvider {
    name: String,
    page_url: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        reader_base: String,
        client: reqwest::Client,
    },
}

impl ReaderProvider {
    pub fn from_fixture(name: &str, page_url: &str, markdown: &str) -> Self {
        Self {
            name: name.to_string(),
            page_url: page_url.to_string(),
            mode: Mode::Fixture(markdown.to_string()),
        }
    }

    pub fn http(name: &str, reader_base: &str, page_url: &str, client: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            page_url: page_url.to_string(),
            mode: Mode::Http {
                reader_base: reader_base.to_string(),
                client,
            },
        }
    }
}

#[async_trait]
impl SourceProvider for ReaderProvider {
    async fn fetch(&self) -> Result<Vec<RawDocument>> {
        let body = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http {
                reader_base,
                client,
            } => client
                .get(format!("{reader_base}{}", self.page_url))
                .header(reqwest::header::ACCEPT, "text/markdown")
                .send()
                .await
                .with_context(|| format!("reader get ({})", self.page_url))?
                .error_for_status()
                .with_context(|| format!("reader non-2xx ({})", self.page_url))?
                .text()
                .await
                .context("reader .text()")?,
        };
        Ok(vec![RawDocument {
            source_name: self.name.clone(),
            kind: DocumentKind::Reader {
                page_url: self.page_url.clone(),
            },
            body,
        }])
    }

    fn name(&self) -> &str {
        &self.name
    }
}
