use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::ingest::types::{RawDocument, SourceProvider};

pub struct SearchProvider {
    name: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        endpoint: String,
        query: String,
        api_key: Option<String>,
        client: reqwest::Client,
    },
}

impl SearchProvider {
    pub fn from_fixture(name: &str, body: &str) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn http(
        name: &str,
        endpoint: &str,
        query: &str,
        api_key: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            name: name.to_string(),
            mode: Mode::Http {
                endpoint: endpoint.to_string(),
                query: query.to_string(),
                api_key,
                client,
            },
        }
    }
}

#[async_trait]
impl SourceProvider for SearchProvider {
    async fn fetch(&self) -> Result<Vec<RawDocument>> {
        let body = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http {
                endpoint,
                query,
                api_key,
                client,
            } => {
                let mut req = client
                    .post(endpoint)
                    .header(reqwest::header::ACCEPT, "text/plain")
                    .json(&serde_json::json!({ "q": query }));
                if let Some(key) = api_key {
                    req = req.bearer_auth(key);
                }
                req.send()
                    .await
                    .with_context(|| format!("search post ({})", self.name))?
                    .error_for_status()
                    .with_context(|| format!("search non-2xx ({})", self.name))?
                    .text()
                    .await
                    .context("search .text()")?
            }
        };
        Ok(vec![RawDocument::search(&self.name, body)])
    }

    fn name(&self) -> &str {
        &self.name
    }
}
