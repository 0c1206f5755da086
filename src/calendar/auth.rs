// Google OAuth access tokens: expiry checks and refresh-token exchange

use crate::config::OAuthClientConfig;
use crate::error::{AppError, AppResult};
use crate::http_config::HttpConfig;
use crate::utils::logging;
use chrono::{DateTime, Duration, Utc};
use log::warn;
use reqwest::Client;
use serde::Deserialize;
use std::env;

pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Tokens are refreshed when they expire within this many minutes.
const REFRESH_MARGIN_MINUTES: i64 = 5;

#[derive(Debug, Clone, Default)]
pub struct GoogleTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl GoogleTokens {
    /// `GOOGLE_ACCESS_TOKEN`, `GOOGLE_REFRESH_TOKEN` and an optional RFC 3339
    /// `GOOGLE_TOKEN_EXPIRES_AT`. Blank values count as unset.
    pub fn from_env() -> AppResult<Self> {
        let read = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        let expires_at = match read("GOOGLE_TOKEN_EXPIRES_AT") {
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(&raw)
                    .map_err(|e| AppError::config(format!("Invalid GOOGLE_TOKEN_EXPIRES_AT: {}", e)))?
                    .with_timezone(&Utc),
            ),
            None => None,
        };

        Ok(Self {
            access_token: read("GOOGLE_ACCESS_TOKEN"),
            refresh_token: read("GOOGLE_REFRESH_TOKEN"),
            expires_at,
        })
    }

    pub fn needs_refresh(&self) -> bool {
        if self.access_token.is_none() {
            return true;
        }
        match self.expires_at {
            Some(expires_at) => expires_at <= Utc::now() + Duration::minutes(REFRESH_MARGIN_MINUTES),
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: Option<i64>,
}

pub struct GoogleTokenRefresher {
    http: Client,
    token_url: String,
    client: OAuthClientConfig,
}

impl GoogleTokenRefresher {
    pub fn new(client: OAuthClientConfig, http_config: &HttpConfig) -> AppResult<Self> {
        Ok(Self {
            http: http_config.build_client()?,
            token_url: GOOGLE_TOKEN_URL.to_string(),
            client,
        })
    }

    pub fn with_token_url(mut self, token_url: &str) -> Self {
        self.token_url = token_url.to_string();
        self
    }

    /// Exchange a refresh token for a fresh access token and its expiry.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> AppResult<(String, Option<DateTime<Utc>>)> {
        let mut form = vec![
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        if let Some(redirect_uri) = self.client.redirect_uri.as_deref() {
            form.push(("redirect_uri", redirect_uri));
        }

        let response = self.http.post(&self.token_url).form(&form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            logging::log_auth_event("Token refresh rejected", status.as_str());
            return Err(AppError::auth(format!("Token refresh failed with HTTP {}: {}", status, body)));
        }

        let refreshed: RefreshResponse = response.json().await?;
        let expires_at = refreshed
            .expires_in
            .map(|seconds| Utc::now() + Duration::seconds(seconds));
        logging::log_auth_event("Access token refreshed", "google");
        Ok((refreshed.access_token, expires_at))
    }
}

/// A usable access token, refreshing `tokens` in place when it is missing or
/// about to expire.
pub async fn ensure_access_token(
    tokens: &mut GoogleTokens,
    refresher: Option<&GoogleTokenRefresher>,
) -> AppResult<String> {
    if !tokens.needs_refresh() {
        if let Some(token) = &tokens.access_token {
            return Ok(token.clone());
        }
    }

    let Some(refresh_token) = tokens.refresh_token.clone() else {
        return match &tokens.access_token {
            Some(token) => {
                warn!("Access token is about to expire and no refresh token is available");
                Ok(token.clone())
            }
            None => Err(AppError::auth(
                "No Google access token or refresh token available",
            )),
        };
    };

    let refresher = refresher.ok_or_else(|| {
        AppError::config("GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET are required for token refresh")
    })?;
    let (access_token, expires_at) = refresher.refresh_access_token(&refresh_token).await?;
    tokens.access_token = Some(access_token.clone());
    tokens.expires_at = expires_at;
    Ok(access_token)
}
