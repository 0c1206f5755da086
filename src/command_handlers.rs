//! Command handlers behind the `calsync` binary.
//!
//! Each handler owns a `Database` clone and returns `AppError` so the
//! front end can render failures uniformly.

use crate::calendar::auth::{ensure_access_token, GoogleTokenRefresher, GoogleTokens};
use crate::calendar::locks::SyncLocks;
use crate::calendar::push;
use crate::calendar::{
    CalendarReconciler, EventStore, GoogleCalendarClient, RemoteCalendarProvider,
    RemoteEventWriter,
};
use crate::config::Config;
use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::http_config::HttpConfig;
use crate::models::{LocalEvent, PushOutcome, ReconcileResult, SyncStatus, User};
use crate::utils::circuit_breaker::{get_circuit_breaker, GOOGLE_CALENDAR};
use chrono::{DateTime, Utc};
use log::info;
use std::sync::Arc;

/// Owner and local event handlers
pub struct DatabaseHandlers {
    pub db: Database,
}

impl DatabaseHandlers {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn add_user(&self, email: &str) -> AppResult<User> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::invalid_input(format!("Not an email address: {}", email)));
        }
        if self.db.find_user_by_email(email).await?.is_some() {
            return Err(AppError::invalid_input(format!("User {} already exists", email)));
        }

        let user = self.db.add_user(email).await?;
        info!("Added user {}", user.id);
        Ok(user)
    }

    pub async fn add_manual_event(
        &self,
        owner_id: &str,
        title: &str,
        at: DateTime<Utc>,
    ) -> AppResult<LocalEvent> {
        self.require_owner(owner_id).await?;
        if title.trim().is_empty() {
            return Err(AppError::invalid_input("Event title must not be empty"));
        }
        Ok(self.db.create_manual_event(owner_id, title, at).await?)
    }

    pub async fn status(&self, owner_id: &str) -> AppResult<SyncStatus> {
        self.require_owner(owner_id).await?;
        Ok(self.db.sync_status(owner_id).await?)
    }

    async fn require_owner(&self, owner_id: &str) -> AppResult<()> {
        if !self.db.owner_exists(owner_id).await? {
            return Err(AppError::not_found(format!("User {}", owner_id)));
        }
        Ok(())
    }
}

/// Google Calendar handlers. Every sync started through one instance
/// shares its lock registry.
pub struct CalendarHandlers {
    pub db: Database,
    pub config: Config,
    pub locks: Arc<SyncLocks>,
}

impl CalendarHandlers {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db,
            config,
            locks: Arc::new(SyncLocks::new()),
        }
    }

    /// Build a client from the environment tokens, refreshing the access
    /// token first when needed.
    pub async fn google_client(&self) -> AppResult<GoogleCalendarClient> {
        let mut tokens = GoogleTokens::from_env()?;
        let refresher = match &self.config.oauth {
            Some(oauth) => Some(GoogleTokenRefresher::new(oauth.clone(), &HttpConfig::oauth())?),
            None => None,
        };
        let access_token = ensure_access_token(&mut tokens, refresher.as_ref()).await?;

        Ok(
            GoogleCalendarClient::new(&access_token, &HttpConfig::calendar_api())?
                .with_page_size(self.config.page_size)
                .with_circuit_breaker(get_circuit_breaker(GOOGLE_CALENDAR).await),
        )
    }

    pub async fn sync<P: RemoteCalendarProvider>(
        &self,
        provider: P,
        owner_id: &str,
        calendar_id: Option<&str>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> ReconcileResult {
        CalendarReconciler::new(provider, self.db.clone())
            .with_lookback_days(self.config.lookback_days)
            .with_locks(self.locks.clone())
            .reconcile(owner_id, calendar_id, since, until)
            .await
    }

    pub async fn push<W: RemoteEventWriter>(
        &self,
        writer: &W,
        owner_id: &str,
        event_id: &str,
    ) -> PushOutcome {
        push::push_event(&self.db, writer, owner_id, event_id).await
    }

    pub async fn delete_remote<W: RemoteEventWriter>(
        &self,
        writer: &W,
        calendar_id: &str,
        external_id: &str,
    ) -> PushOutcome {
        push::delete_remote_event(writer, calendar_id, external_id).await
    }
}

/// Command handler factory
pub struct CommandHandlers {
    pub database: DatabaseHandlers,
    pub calendar: CalendarHandlers,
}

impl CommandHandlers {
    pub fn new(db: &Database, config: Config) -> Self {
        Self {
            database: DatabaseHandlers::new(db.clone()),
            calendar: CalendarHandlers::new(db.clone(), config),
        }
    }
}
