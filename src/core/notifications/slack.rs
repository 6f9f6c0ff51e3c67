use super::{NotificationChannel, OffloadEvent};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

/// Posts completions and interrupted ejects to a Slack incoming webhook.
pub struct SlackNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    /// `None` for events that are too chatty for a channel.
    fn format_message(&self, event: &OffloadEvent) -> Option<serde_json::Value> {
        match event {
            OffloadEvent::Completed { record, .. } => Some(json!({
                "blocks": [
                    {
                        "type": "header",
                        "text": {
                            "type": "plain_text",
                            "text": "Offload Verified",
                            "emoji": true
                        }
                    },
                    {
                        "type": "section",
                        "fields": [
                            {
                                "type": "mrkdwn",
                                "text": format!("*Card:*\n{}", record.card_label)
                            },
                            {
                                "type": "mrkdwn",
                                "text": format!("*Clips:*\n{} ({})", record.clip_count, record.total_size)
                            },
                            {
                                "type": "mrkdwn",
                                "text": format!("*Destination:*\n`{}`", record.destination)
                            },
                            {
                                "type": "mrkdwn",
                                "text": format!("*Finished:*\n{}", record.date)
                            }
                        ]
                    }
                ]
            })),
            OffloadEvent::Ejected {
                label,
                interrupted: Some(status),
                ..
            } => Some(json!({
                "blocks": [
                    {
                        "type": "header",
                        "text": {
                            "type": "plain_text",
                            "text": "Card Ejected Mid-Run",
                            "emoji": true
                        }
                    },
                    {
                        "type": "section",
                        "text": {
                            "type": "mrkdwn",
                            "text": format!("*{}* was ejected while `{}`. The run was discarded.", label, status)
                        }
                    }
                ]
            })),
            _ => None,
        }
    }
}

#[async_trait]
impl NotificationChannel for SlackNotifier {
    async fn notify(&self, event: OffloadEvent) -> Result<()> {
        let Some(payload) = self.format_message(&event) else {
            return Ok(());
        };
        self.client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
