//! OAuth token storage for the progress-tracking API.
//!
//! The store is the only place tokens live on disk. The authenticated client
//! holds its own in-memory copy and calls back into the store when the access
//! token is rejected.

use crate::constants::{USER_AGENT, intervals};
use crate::error::TrackerError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

impl TokenSet {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: None,
            expires_in: None,
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current tokens, or [`TrackerError::CredentialsNotFound`] when initial
    /// authorization never ran.
    async fn load(&self) -> Result<TokenSet, TrackerError>;

    /// Exchanges a refresh token for a new token pair. Does not persist.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, TrackerError>;

    async fn persist(&self, tokens: &TokenSet) -> Result<(), TrackerError>;
}

#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Tokens in a JSON file, refreshed against the OAuth token endpoint.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    oauth: OAuthClientConfig,
    client: Client,
}

impl FileCredentialStore {
    pub fn new(
        path: impl Into<PathBuf>,
        oauth: OAuthClientConfig,
        timeout: Duration,
    ) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(intervals::CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            path: path.into(),
            oauth,
            client,
        })
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<TokenSet, TrackerError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TrackerError::CredentialsNotFound(self.path.clone()));
            }
            Err(e) => {
                return Err(TrackerError::Decode(format!(
                    "{}: {e}",
                    self.path.display()
                )));
            }
        };

        let tokens: TokenSet = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), "Loaded stored tokens");
        Ok(tokens)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, TrackerError> {
        let params = [
            ("client_id", self.oauth.client_id.as_str()),
            ("client_secret", self.oauth.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let response = self
            .client
            .post(&self.oauth.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| TrackerError::AuthExpired(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Token refresh rejected");
            return Err(TrackerError::AuthExpired(format!("HTTP {status}: {body}")));
        }

        let tokens: TokenSet = response
            .json()
            .await
            .map_err(|e| TrackerError::AuthExpired(e.to_string()))?;

        info!("Access token refreshed");
        Ok(tokens)
    }

    async fn persist(&self, tokens: &TokenSet) -> Result<(), TrackerError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| TrackerError::CredentialWrite(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(tokens)?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| TrackerError::CredentialWrite(e.to_string()))?;

        debug!(path = %self.path.display(), "Persisted tokens");
        Ok(())
    }
}
