use crate::config::AgentConfig;
use crate::inspector::SystemInspector;
use chrono::{DateTime, Utc};
use hostwatch_common::types::{AlertEvent, Notification};
use hostwatch_notify::manager::NotificationManager;
use hostwatch_storage::StateStore;
use std::sync::Arc;

/// Shared handles passed to every task.
#[derive(Clone)]
pub struct AgentContext {
    pub config: Arc<AgentConfig>,
    pub store: Arc<StateStore>,
    pub notifier: Arc<NotificationManager>,
    pub inspector: Arc<dyn SystemInspector>,
}

impl AgentContext {
    pub fn new(
        config: Arc<AgentConfig>,
        store: Arc<StateStore>,
        notifier: Arc<NotificationManager>,
        inspector: Arc<dyn SystemInspector>,
    ) -> Self {
        Self {
            config,
            store,
            notifier,
            inspector,
        }
    }

    /// Cooldown-gated send. Returns `true` only when the notification was
    /// delivered.
    pub async fn alert(&self, key: &str, notification: &Notification) -> bool {
        self.alert_at(key, notification, Utc::now()).await
    }

    pub async fn alert_at(&self, key: &str, notification: &Notification, now: DateTime<Utc>) -> bool {
        if self.store.cooldown_at(key, now) {
            return false;
        }
        self.notifier.send(notification).await
    }

    pub async fn alert_event(&self, event: &AlertEvent) -> bool {
        tracing::warn!(
            key = %event.key,
            metric = %event.metric_name,
            severity = %event.severity,
            value = event.value,
            threshold = event.threshold,
            "Alert raised"
        );
        self.alert_at(&event.key, &event.to_notification(), event.timestamp)
            .await
    }

    /// Ungated send for scheduled reports guarded by their own markers.
    pub async fn notify(&self, notification: &Notification) -> bool {
        self.notifier.send(notification).await
    }
}
