//! Transport error type shared by the Slack client, dispatcher and poll loop.

use std::time::Duration;

/// Slack API error codes that mean the credential is no longer usable.
const AUTH_ERRORS: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "token_revoked",
    "token_expired",
    "account_inactive",
];

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("slack request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("slack {method} failed: {status} {body}")]
    Http {
        method: String,
        status: u16,
        body: String,
    },
    #[error("slack {method} failed: {error}")]
    Api { method: String, error: String },
    #[error("slack authentication failed: {0}")]
    Auth(String),
    #[error("slack rate limited, retry after {}s", .retry_after.as_secs())]
    RateLimited { retry_after: Duration },
    #[error("session is not connected")]
    NotConnected,
    #[error("no channels to watch: configure slack.channels or invite the bot to a channel")]
    NoChannels,
}

impl TransportError {
    /// Build an error from a `{"ok": false, "error": ...}` response, classifying auth failures.
    pub fn from_api(method: &str, error: impl Into<String>) -> Self {
        let error = error.into();
        if AUTH_ERRORS.contains(&error.as_str()) {
            TransportError::Auth(format!("{}: {}", method, error))
        } else {
            TransportError::Api {
                method: method.to_string(),
                error,
            }
        }
    }

    /// True when the session cannot continue without a new credential.
    pub fn is_auth(&self) -> bool {
        matches!(self, TransportError::Auth(_))
    }
}
