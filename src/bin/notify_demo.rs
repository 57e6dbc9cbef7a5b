//! Sends one of each moderation notice through the sinks configured in env
//! (SLACK_WEBHOOK_URL, DISCORD_WEBHOOK_URL, SMTP_*).

use chrono::Utc;
use community_events::{ModerationNotice, NotifierMux};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();
    let _ = dotenvy::dotenv();
    let mux = NotifierMux::from_env();
    if mux.is_empty() {
        println!("no sinks configured; set SLACK_WEBHOOK_URL, DISCORD_WEBHOOK_URL or SMTP_HOST");
        return;
    }

    let now = Utc::now();
    let notices = [
        ModerationNotice::AwaitingReview { count: 3, at: now },
        ModerationNotice::Published {
            event_id: "demo-1".into(),
            title: "QTIPOC Poetry Night".into(),
            source_url: "https://example.org/e/1".into(),
            at: now,
        },
        ModerationNotice::Rejected {
            event_id: "demo-2".into(),
            title: "Estate Agents Breakfast".into(),
            by: "demo".into(),
            reason: "not a community event".into(),
            at: now,
        },
    ];

    for n in &notices {
        let delivered = mux.notify(n).await;
        println!("{} -> {delivered} sink(s)", n.headline());
    }
}
