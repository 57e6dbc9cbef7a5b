// src/ingest/types.rs
use anyhow::Result;

/// What kind of text a provider handed back; decides which extractor runs on it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentKind {
    /// `[N] Title: / URL Source: / Description:` result listing.
    Search,
    /// Reader-service markdown of a single listing page.
    Reader { page_url: String },
    /// RSS 2.0 document.
    Feed,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RawDocument {
    pub source_name: String, // e.g., "Search: QTIPOC London", "QX Magazine Feed"
    #[serde(flatten)]
    pub kind: DocumentKind,
    pub body: String,
}

impl RawDocument {
    pub fn search(source_name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            kind: DocumentKind::Search,
            body: body.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawDocument>>;
    fn name(&self) -> &str;
}
