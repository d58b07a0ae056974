/// Errors raised while delivering a notification.
///
/// # Examples
///
/// ```rust
/// use hostwatch_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing bot token".to_string());
/// assert!(err.to_string().contains("bot token"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// A required channel setting is empty or malformed.
    #[error("notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// Transport failure, including timeouts.
    #[error("notify: request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("notify: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The sink answered but did not accept the message.
    #[error("notify: {channel} rejected message (status {status}): {body}")]
    Rejected {
        channel: &'static str,
        status: u16,
        body: String,
    },
}

pub type Result<T> = std::result::Result<T, NotifyError>;
