use crate::error::{NotifyError, Result};
use crate::utils::{escape_html, truncate_chars, truncate_string, MAX_BODY_LENGTH, MAX_MESSAGE_CHARS};
use crate::NotificationChannel;
use async_trait::async_trait;
use hostwatch_common::host::HostIdentity;
use hostwatch_common::types::Notification;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

pub struct TelegramChannel {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(api_base: &str, bot_token: &str, chat_id: &str, timeout: Duration) -> Result<Self> {
        if bot_token.trim().is_empty() {
            return Err(NotifyError::InvalidConfig("telegram bot token is empty".into()));
        }
        if chat_id.trim().is_empty() {
            return Err(NotifyError::InvalidConfig("telegram chat id is empty".into()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token.trim()
            ),
            chat_id: chat_id.trim().to_string(),
        })
    }

    /// Render the HTML body: icon + bold title, host line, bullet lines.
    /// The visible text is capped at [`MAX_MESSAGE_CHARS`] before escaping,
    /// so an entity is never cut in half.
    pub fn format_html(host: &HostIdentity, notification: &Notification) -> String {
        let mut text = String::new();
        let mut remaining = MAX_MESSAGE_CHARS;

        push_visible(&mut text, &format!("{} ", notification.icon), &mut remaining);
        text.push_str("<b>");
        push_visible(&mut text, &notification.title, &mut remaining);
        text.push_str("</b>");
        push_visible(&mut text, "\n🖥 ", &mut remaining);
        text.push_str("<code>");
        push_visible(&mut text, &host.hostname, &mut remaining);
        text.push_str("</code>");
        push_visible(&mut text, &format!(" ({})", host.display_ip()), &mut remaining);

        for line in &notification.lines {
            if !push_visible(&mut text, &format!("\n• {line}"), &mut remaining) {
                break;
            }
        }
        text
    }
}

/// Appends `raw` escaped, cutting it to the remaining character budget.
/// Returns `false` once the budget is exhausted.
fn push_visible(out: &mut String, raw: &str, remaining: &mut usize) -> bool {
    if *remaining == 0 {
        return false;
    }
    let count = raw.chars().count();
    if count <= *remaining {
        out.push_str(&escape_html(raw));
        *remaining -= count;
        return true;
    }
    out.push_str(&escape_html(&truncate_chars(raw, *remaining)));
    *remaining = 0;
    false
}

/// The Bot API signals acceptance with `{"ok": true}` in a 2xx body.
pub fn is_accepted(status: u16, body: &Value) -> bool {
    (200..300).contains(&status) && body.get("ok").and_then(Value::as_bool) == Some(true)
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    async fn send(&self, host: &HostIdentity, notification: &Notification) -> Result<()> {
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": Self::format_html(host, notification),
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let resp = self.client.post(&self.endpoint).json(&payload).send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        if is_accepted(status, &body) {
            tracing::debug!(title = %notification.title, "Telegram message accepted");
            Ok(())
        } else {
            Err(NotifyError::Rejected {
                channel: "telegram",
                status,
                body: truncate_string(&text, MAX_BODY_LENGTH),
            })
        }
    }

    fn channel_name(&self) -> &str {
        "telegram"
    }
}
