//! IAM token exchange.
//!
//! An API key is exchanged for a bearer token once and reused until shortly
//! before it expires.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{ApiError, Result};

/// Refresh this long before the token actually expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct Token {
    value: String,
    expires_at: Instant,
}

pub struct Authenticator {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    token: RwLock<Option<Token>>,
}

impl Authenticator {
    /// `endpoint` is the full token URL, e.g. `https://iam.cloud.ibm.com/identity/token`.
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            token: RwLock::new(None),
        }
    }

    /// A valid bearer token, fetching a new one if needed.
    pub async fn token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            if Instant::now() + REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = slot.as_ref() {
            if Instant::now() + REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let token = self.exchange().await?;
        let value = token.value.clone();
        *slot = Some(token);
        Ok(value)
    }

    async fn exchange(&self) -> Result<Token> {
        if self.api_key.is_empty() {
            return Err(ApiError::Auth("no API key given".to_string()));
        }
        debug!(endpoint = %self.endpoint, "requesting IAM token");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "urn:ibm:params:oauth:grant-type:apikey"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Auth(format!(
                "token request returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Auth(format!("token response: {}", e)))?;
        Ok(Token {
            value: parsed.access_token,
            expires_at: Instant::now() + Duration::from_secs(parsed.expires_in),
        })
    }
}
