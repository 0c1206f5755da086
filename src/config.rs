//! Runtime configuration read from the environment.

use crate::calendar::reconcile::DEFAULT_LOOKBACK_DAYS;
use crate::error::{AppError, AppResult};
use log::info;
use std::env;
use std::path::PathBuf;

/// Largest page size the Google events list endpoint accepts.
pub const MAX_PAGE_SIZE: u32 = 2500;

/// A century of history is the widest default window a run will request.
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub oauth: Option<OAuthClientConfig>,
    pub lookback_days: i64,
    pub page_size: u32,
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        let database_path = match env::var("CALSYNC_DATABASE_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_database_path(),
        };

        let oauth = match (env::var("GOOGLE_CLIENT_ID"), env::var("GOOGLE_CLIENT_SECRET")) {
            (Ok(client_id), Ok(client_secret)) => Some(OAuthClientConfig {
                client_id,
                client_secret,
                redirect_uri: env::var("GOOGLE_REDIRECT_URI").ok(),
            }),
            _ => None,
        };

        let config = Self {
            database_path,
            oauth,
            lookback_days: parse_var("CALSYNC_LOOKBACK_DAYS", DEFAULT_LOOKBACK_DAYS)?,
            page_size: parse_var("CALSYNC_PAGE_SIZE", MAX_PAGE_SIZE)?,
        };
        config.validate()?;

        info!(
            "Configuration loaded (database: {}, lookback: {} days, oauth client: {})",
            config.database_path.display(),
            config.lookback_days,
            if config.oauth.is_some() { "set" } else { "unset" }
        );
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(AppError::config("Database path must not be empty"));
        }
        if self.lookback_days <= 0 || self.lookback_days > MAX_LOOKBACK_DAYS {
            return Err(AppError::config(format!(
                "CALSYNC_LOOKBACK_DAYS must be between 1 and {}",
                MAX_LOOKBACK_DAYS
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(AppError::config(format!(
                "CALSYNC_PAGE_SIZE must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        if let Some(oauth) = &self.oauth {
            if oauth.client_id.trim().is_empty() || oauth.client_secret.trim().is_empty() {
                return Err(AppError::config("Google OAuth client id and secret must not be empty"));
            }
        }
        Ok(())
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("calsync")
        .join("calsync.db")
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::config(format!("{} is not a valid number: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
