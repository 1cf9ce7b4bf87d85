use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::models::{
    ChannelAttempt, ChannelKind, ChannelPreference, Contact, DeliveryOutcome, DeliveryReport,
    Notice,
};

/// A hung provider must not hang the dispatcher; each attempt is bounded.
pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    fn kind(&self) -> ChannelKind;

    async fn deliver(&self, contact: &Contact, notice: &Notice) -> Result<()>;
}

/// Tries channels in preference order and never propagates a channel failure
/// to the caller: the worst outcome is a report marked `Undelivered`.
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
    channel_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self {
            channels,
            channel_timeout: DEFAULT_CHANNEL_TIMEOUT,
        }
    }

    pub fn with_channel_timeout(mut self, channel_timeout: Duration) -> Self {
        self.channel_timeout = channel_timeout;
        self
    }

    pub async fn dispatch(
        &self,
        contact: &Contact,
        preference: ChannelPreference,
        notice: &Notice,
    ) -> DeliveryReport {
        let mut ordered: Vec<&Arc<dyn NotificationChannel>> = self.channels.iter().collect();
        if preference == ChannelPreference::EmailFirst {
            // Stable sort: email channels move ahead, relative order is kept
            ordered.sort_by_key(|channel| match channel.kind() {
                ChannelKind::Email => 0,
                ChannelKind::Phone => 1,
            });
        }

        let mut failed_attempts = Vec::new();

        for channel in ordered {
            let reachable = match channel.kind() {
                ChannelKind::Phone => contact.phone.is_some(),
                ChannelKind::Email => contact.email.is_some(),
            };
            if !reachable {
                continue;
            }

            match timeout(self.channel_timeout, channel.deliver(contact, notice)).await {
                Ok(Ok(())) => {
                    info!("'{}' delivered via {}", notice.subject, channel.name());
                    return DeliveryReport {
                        outcome: DeliveryOutcome::Delivered {
                            channel: channel.name(),
                        },
                        failed_attempts,
                    };
                }
                Ok(Err(e)) => {
                    warn!("{} delivery failed: {}", channel.name(), e);
                    failed_attempts.push(ChannelAttempt {
                        channel: channel.name(),
                        error: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(
                        "{} delivery timed out after {:?}",
                        channel.name(),
                        self.channel_timeout
                    );
                    failed_attempts.push(ChannelAttempt {
                        channel: channel.name(),
                        error: format!("timed out after {:?}", self.channel_timeout),
                    });
                }
            }
        }

        warn!(
            "notification '{}' for {} undelivered after {} attempt(s)",
            notice.subject,
            contact.name,
            failed_attempts.len()
        );

        DeliveryReport {
            outcome: DeliveryOutcome::Undelivered,
            failed_attempts,
        }
    }
}
