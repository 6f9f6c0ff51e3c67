mod bell;
mod slack;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::{NotificationChannelType, NotificationConfig};
use crate::core::models::{BackupRecord, CardStatus};

pub use bell::BellNotifier;
pub use slack::SlackNotifier;

/// Events raised by commands and by the ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OffloadEvent {
    Started {
        card_id: String,
        label: String,
        resumed: bool,
    },
    Paused {
        card_id: String,
        label: String,
        progress: f64,
    },
    Ejected {
        card_id: String,
        label: String,
        /// Status of the run that was discarded, if one was in flight.
        interrupted: Option<CardStatus>,
    },
    Mounted {
        card_id: String,
        label: String,
    },
    /// Fires exactly once per run that reaches COMPLETED.
    Completed {
        card_id: String,
        record: BackupRecord,
    },
}

impl OffloadEvent {
    pub fn card_id(&self) -> &str {
        match self {
            Self::Started { card_id, .. }
            | Self::Paused { card_id, .. }
            | Self::Ejected { card_id, .. }
            | Self::Mounted { card_id, .. }
            | Self::Completed { card_id, .. } => card_id,
        }
    }

    pub fn cue(&self) -> Cue {
        match self {
            Self::Started { .. } => Cue::Start,
            Self::Paused { .. } | Self::Ejected { .. } => Cue::Alert,
            Self::Mounted { .. } | Self::Completed { .. } => Cue::Success,
        }
    }
}

/// Audible/visual cue category for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Start,
    Success,
    Alert,
}

/// Trait for notification channel implementations (terminal bell, Slack, etc.)
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn notify(&self, event: OffloadEvent) -> Result<()>;
}

/// Factory function to create a notifier based on config
pub fn create_notifier(config: &NotificationConfig) -> Option<Arc<dyn NotificationChannel>> {
    match &config.channel {
        NotificationChannelType::None => None,
        NotificationChannelType::Bell => Some(Arc::new(BellNotifier::stderr())),
        NotificationChannelType::Slack => {
            let webhook = config.slack_webhook.as_ref()?;
            if webhook.is_empty() {
                return None;
            }
            Some(Arc::new(SlackNotifier::new(webhook.clone())))
        }
    }
}

/// Forward broadcast events to `channel` until cancelled or the sender is gone.
pub async fn forward(
    mut rx: broadcast::Receiver<OffloadEvent>,
    channel: Arc<dyn NotificationChannel>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Notification forwarder lagged behind");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        debug!(card_id = %event.card_id(), cue = ?event.cue(), "Dispatching notification");
        if let Err(e) = channel.notify(event).await {
            warn!(error = %e, "Notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<OffloadEvent>>,
    }

    #[async_trait]
    impl NotificationChannel for Recorder {
        async fn notify(&self, event: OffloadEvent) -> Result<()> {
            self.seen.lock().await.push(event);
            Ok(())
        }
    }

    #[test]
    fn cues_follow_event_kind() {
        let started = OffloadEvent::Started {
            card_id: "a".into(),
            label: "Mag A".into(),
            resumed: false,
        };
        let ejected = OffloadEvent::Ejected {
            card_id: "a".into(),
            label: "Mag A".into(),
            interrupted: None,
        };
        let mounted = OffloadEvent::Mounted {
            card_id: "a".into(),
            label: "Mag A".into(),
        };
        assert_eq!(started.cue(), Cue::Start);
        assert_eq!(ejected.cue(), Cue::Alert);
        assert_eq!(mounted.cue(), Cue::Success);
    }

    #[test]
    fn no_channel_without_config() {
        assert!(create_notifier(&NotificationConfig::default()).is_none());

        let slack_without_hook = NotificationConfig {
            channel: NotificationChannelType::Slack,
            slack_webhook: Some(String::new()),
        };
        assert!(create_notifier(&slack_without_hook).is_none());
    }

    #[tokio::test]
    async fn forward_delivers_until_cancelled() {
        let (tx, rx) = broadcast::channel(8);
        let recorder = Arc::new(Recorder::default());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(forward(rx, recorder.clone(), cancel.clone()));

        tx.send(OffloadEvent::Mounted {
            card_id: "card-a".into(),
            label: "Mag A".into(),
        })
        .unwrap();
        drop(tx);
        task.await.unwrap();

        let seen = recorder.seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].card_id(), "card-a");
    }
}
