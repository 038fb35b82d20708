//! Credential store seam
//!
//! Bearer tokens are owned by an external store. The resolver only reads
//! the current token and, when configured to, asks the store to refresh it.

use crate::{
    Error, Result,
    types::{AccessToken, UserToken},
};
use tokio::sync::RwLock;
use tracing::debug;

/// Source of short-lived bearer credentials
///
/// `refresh` may be called concurrently and must be safe to repeat.
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Token to use for the next request
    async fn current_token(&self) -> Result<AccessToken>;

    /// Obtain a new token
    async fn refresh(&self) -> Result<AccessToken>;

    /// Session user token sent alongside the bearer token, if any
    async fn user_token(&self) -> Result<Option<UserToken>> {
        Ok(None)
    }
}

/// In-memory credential store holding a fixed token
#[derive(Debug)]
pub struct StaticCredentials {
    token: RwLock<AccessToken>,
    user_token: Option<UserToken>,
}

impl StaticCredentials {
    /// Create a store around `token`
    pub fn new(token: AccessToken) -> Self {
        Self {
            token: RwLock::new(token),
            user_token: None,
        }
    }

    /// Attach a session user token
    pub fn with_user_token(mut self, user_token: UserToken) -> Self {
        self.user_token = Some(user_token);
        self
    }

    /// Replace the held token
    pub async fn set_token(&self, token: AccessToken) {
        debug!("Replacing static access token");
        *self.token.write().await = token;
    }
}

#[async_trait::async_trait]
impl CredentialStore for StaticCredentials {
    async fn current_token(&self) -> Result<AccessToken> {
        Ok(self.token.read().await.clone())
    }

    async fn refresh(&self) -> Result<AccessToken> {
        Err(Error::unauthorized("static credentials cannot be refreshed"))
    }

    async fn user_token(&self) -> Result<Option<UserToken>> {
        Ok(self.user_token.clone())
    }
}
