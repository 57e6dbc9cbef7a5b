use anyhow::{Context, Result};
use reqwest::Client;

use super::{ModerationNotice, Notifier};

pub struct SlackNotifier {
    webhook_url: Option<String>,
    client: Client,
}

impl SlackNotifier {
    pub fn from_env() -> Self {
        Self {
            webhook_url: std::env::var("SLACK_WEBHOOK_URL").ok(),
            client: Client::new(),
        }
    }

    pub fn new(url: String) -> Self {
        Self {
            webhook_url: Some(url),
            client: Client::new(),
        }
    }
}

fn slack_text(notice: &ModerationNotice) -> String {
    format!("*{}*\n```{}```", notice.headline(), notice.body())
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, notice: &ModerationNotice) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            tracing::debug!(target: "notify", "Slack disabled (no SLACK_WEBHOOK_URL)");
            return Ok(());
        };

        let body = serde_json::json!({ "text": slack_text(notice) });

        self.client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
