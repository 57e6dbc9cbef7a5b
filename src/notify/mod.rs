//! Moderator notices: fan-out to whichever sinks are configured. Sends are best effort;
//! a failed notice is logged and never propagates into the moderation result.

pub mod discord;
pub mod email;
pub mod slack;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModerationNotice {
    Published {
        event_id: String,
        title: String,
        source_url: String,
        at: DateTime<Utc>,
    },
    Rejected {
        event_id: String,
        title: String,
        by: String,
        reason: String,
        at: DateTime<Utc>,
    },
    /// New drafts landed in the review queue.
    AwaitingReview { count: usize, at: DateTime<Utc> },
}

impl ModerationNotice {
    pub fn headline(&self) -> String {
        match self {
            ModerationNotice::Published { title, .. } => format!("Published: {title}"),
            ModerationNotice::Rejected { title, .. } => format!("Rejected: {title}"),
            ModerationNotice::AwaitingReview { count, .. } => {
                format!("{count} new event(s) awaiting review")
            }
        }
    }

    pub fn body(&self) -> String {
        match self {
            ModerationNotice::Published {
                event_id,
                source_url,
                at,
                ..
            } => format!("id: {event_id}\nsource: {source_url}\nat: {}", at.to_rfc3339()),
            ModerationNotice::Rejected {
                event_id,
                by,
                reason,
                at,
                ..
            } => format!(
                "id: {event_id}\nby: {by}\nreason: {reason}\nat: {}",
                at.to_rfc3339()
            ),
            ModerationNotice::AwaitingReview { at, .. } => {
                format!("discovery run finished at {}", at.to_rfc3339())
            }
        }
    }
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notice: &ModerationNotice) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Sends each notice to every sink, logging failures per sink.
#[derive(Default)]
pub struct NotifierMux {
    sinks: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Box<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Slack / Discord / SMTP, each only when its env is present.
    pub fn from_env() -> Self {
        let mut mux = Self::new();
        if std::env::var("SLACK_WEBHOOK_URL").is_ok() {
            mux = mux.with(Box::new(slack::SlackNotifier::from_env()));
        }
        if let Ok(url) = std::env::var("DISCORD_WEBHOOK_URL") {
            mux = mux.with(Box::new(discord::DiscordNotifier::new(url)));
        }
        if std::env::var("SMTP_HOST").is_ok() {
            match email::EmailSender::from_env() {
                Ok(sender) => mux = mux.with(Box::new(sender)),
                Err(e) => {
                    tracing::warn!(target: "notify", error = %e, "email notifier disabled")
                }
            }
        }
        mux
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Returns how many sinks accepted the notice.
    pub async fn notify(&self, notice: &ModerationNotice) -> usize {
        let mut ok = 0;
        for sink in &self.sinks {
            match sink.send(notice).await {
                Ok(()) => ok += 1,
                Err(e) => tracing::warn!(
                    target: "notify",
                    sink = sink.name(),
                    error = %e,
                    "notice not delivered"
                ),
            }
        }
        ok
    }
}
