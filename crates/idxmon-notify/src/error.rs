use std::time::Duration;

/// Errors that can occur within the notification subsystem.
///
/// # Examples
///
/// ```rust
/// use idxmon_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing url".to_string());
/// assert!(err.to_string().contains("url"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required field or contains an invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// The channel type is not registered in the plugin registry.
    #[error("Notify: unknown channel type '{0}'")]
    UnknownChannelType(String),

    /// An HTTP request to an external notification endpoint failed.
    #[error("Notify: HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("Notify: JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The external API returned a non-success response.
    #[error("Notify: API error from {service}: status={status}, body={body}")]
    ApiError {
        service: String,
        status: u16,
        body: String,
    },

    /// Some notifications of a batch could not be delivered.
    #[error("Notify: {failed} of {total} notifications failed, first error: {first_error}")]
    BatchFailed {
        failed: usize,
        total: usize,
        first_error: String,
    },

    /// Delivery did not finish within the dispatcher's time limit.
    #[error("Notify: delivery timed out after {0:?}")]
    Timeout(Duration),

    /// Generic notification error for cases not covered by other variants.
    #[error("Notify: {0}")]
    Other(String),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
