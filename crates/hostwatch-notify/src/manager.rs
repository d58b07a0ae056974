use crate::NotificationChannel;
use hostwatch_common::host::HostIdentity;
use hostwatch_common::types::Notification;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Serializes outbound notifications through one channel.
///
/// Concurrent callers queue on an async mutex, and consecutive sends are
/// spaced at least `min_interval` apart to respect the sink's rate limits.
pub struct NotificationManager {
    channel: Box<dyn NotificationChannel>,
    min_interval: Duration,
    host: Option<HostIdentity>,
    last_sent: Mutex<Option<Instant>>,
}

impl NotificationManager {
    pub fn new(channel: Box<dyn NotificationChannel>, min_interval: Duration) -> Self {
        Self {
            channel,
            min_interval,
            host: None,
            last_sent: Mutex::new(None),
        }
    }

    /// Pin the host identity instead of detecting it on every send.
    pub fn with_host(mut self, host: HostIdentity) -> Self {
        self.host = Some(host);
        self
    }

    /// Sends one notification. Returns `true` on delivery; failures are
    /// logged and reported as `false`, never retried.
    pub async fn send(&self, notification: &Notification) -> bool {
        let mut last_sent = self.last_sent.lock().await;

        if let Some(prev) = *last_sent {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }

        let host = self.host.clone().unwrap_or_else(HostIdentity::detect);
        let result = self.channel.send(&host, notification).await;
        *last_sent = Some(Instant::now());

        match result {
            Ok(()) => {
                tracing::info!(
                    channel = self.channel.channel_name(),
                    title = %notification.title,
                    "Notification sent"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    channel = self.channel.channel_name(),
                    title = %notification.title,
                    error = %e,
                    "Failed to send notification"
                );
                false
            }
        }
    }

    pub fn channel(&self) -> &dyn NotificationChannel {
        self.channel.as_ref()
    }
}
