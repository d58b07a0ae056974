use crate::error::Result;
use crate::NotificationChannel;
use async_trait::async_trait;
use hostwatch_common::host::HostIdentity;
use hostwatch_common::types::Notification;

/// Writes notifications to the log instead of an external sink. Used when
/// no bot token is configured.
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, host: &HostIdentity, notification: &Notification) -> Result<()> {
        tracing::info!(
            host = %host.hostname,
            ip = %host.display_ip(),
            title = %notification.title,
            lines = ?notification.lines,
            "{} notification (log channel)",
            notification.icon
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}
