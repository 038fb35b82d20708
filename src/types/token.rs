//! Credential values handed out by a credential store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Short-lived bearer credential
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    /// Bearer value
    pub value: String,
    /// Token used by the store to obtain a new access token
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Expiration timestamp
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Create a token without expiry
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Set the expiry
    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Set the refresh token
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Check if the token is non-empty and not expired
    pub fn is_valid(&self) -> bool {
        !self.value.is_empty() && self.expires_at.is_none_or(|at| Utc::now() < at)
    }
}

// Keep bearer values out of logs
impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Session user token sent as an extra request header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserToken {
    /// Header name
    pub header: String,
    /// Header value
    pub value: String,
}

impl UserToken {
    /// Create a user token header
    pub fn new(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_token_validity() {
        assert!(AccessToken::new("abc").is_valid());
        assert!(!AccessToken::new("").is_valid());

        let fresh = AccessToken::new("abc").expiring_at(Utc::now() + Duration::minutes(5));
        assert!(fresh.is_valid());

        let expired = AccessToken::new("abc").expiring_at(Utc::now() - Duration::seconds(1));
        assert!(!expired.is_valid());
    }

    #[test]
    fn test_debug_redacts_value() {
        let token = AccessToken::new("secret-bearer").with_refresh_token("r");
        let rendered = format!("{:?}", token);
        assert!(!rendered.contains("secret-bearer"));
        assert!(rendered.contains("has_refresh_token: true"));
    }
}
