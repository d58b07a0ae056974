//! Notification delivery to the external messaging sink.
//!
//! Callers hand a [`Notification`] to the [`manager::NotificationManager`],
//! which serializes sends and forwards them to a single
//! [`NotificationChannel`]. The built-in channels are Telegram and a
//! log-only fallback used when no bot token is configured. Deduplication is
//! the caller's job: consult the state store's cooldown first.

pub mod channels;
pub mod error;
pub mod manager;
pub mod utils;


use async_trait::async_trait;
use hostwatch_common::host::HostIdentity;
use hostwatch_common::types::Notification;

/// A delivery channel that renders a notification for one external service.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Delivers the notification, embedding the host identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the sink rejects it. No
    /// retries are attempted.
    async fn send(&self, host: &HostIdentity, notification: &Notification) -> error::Result<()>;

    /// Returns the channel type name (e.g., `"telegram"`).
    fn channel_name(&self) -> &str;
}
