// file: src/database/mod.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePool, Sqlite};
use std::path::Path;

use crate::calendar::EventStore;
use crate::models::{LocalEvent, SyncStatus, SyncedFields, User};

// Declare submodules
pub mod events;
pub mod users;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        Self::connect(&format!("sqlite:{}", path.display())).await
    }

    pub async fn connect(db_url: &str) -> Result<Self> {
        let db_exists = Sqlite::database_exists(db_url)
            .await
            .context("Failed to check if database exists")?;
        if !db_exists {
            info!("Creating database");
            Sqlite::create_database(db_url)
                .await
                .context("Failed to create database")?;
        }

        let pool = SqlitePool::connect(db_url)
            .await
            .context("Failed to connect to database")?;

        run_schema(&pool).await.context("Failed to run database schema")?;

        info!("Database initialized successfully");

        Ok(Database { pool })
    }

    // --- User Delegates ---

    pub async fn add_user(&self, email: &str) -> Result<User> {
        users::add(&self.pool, email).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        users::find_by_email(&self.pool, email).await
    }

    // --- Event Delegates ---

    pub async fn create_event(&self, event: &LocalEvent) -> Result<()> {
        events::insert(&self.pool, event).await
    }

    pub async fn create_manual_event(
        &self,
        owner_id: &str,
        title: &str,
        at: DateTime<Utc>,
    ) -> Result<LocalEvent> {
        let event = LocalEvent::new_manual(owner_id, title, at);
        events::insert(&self.pool, &event).await?;
        Ok(event)
    }

    pub async fn get_event(&self, event_id: &str) -> Result<Option<LocalEvent>> {
        events::get(&self.pool, event_id).await
    }

    pub async fn list_events(&self, owner_id: &str) -> Result<Vec<LocalEvent>> {
        events::list_for_owner(&self.pool, owner_id).await
    }

    pub async fn link_remote_event(
        &self,
        event_id: &str,
        external_id: &str,
        calendar_id: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        events::link_remote(&self.pool, event_id, external_id, calendar_id, at).await
    }

    pub async fn record_sync_error(&self, event_id: &str, message: &str) -> Result<()> {
        events::record_sync_error(&self.pool, event_id, message).await
    }

    pub async fn sync_status(&self, owner_id: &str) -> Result<SyncStatus> {
        events::sync_status(&self.pool, owner_id).await
    }

    #[cfg(test)]
    pub(crate) async fn temporary() -> Result<Self> {
        let temp_file = tempfile::NamedTempFile::new()?;
        let (_, path) = temp_file.keep()?;
        Self::open(&path).await
    }
}

#[async_trait]
impl EventStore for Database {
    async fn owner_exists(&self, owner_id: &str) -> Result<bool> {
        users::exists(&self.pool, owner_id).await
    }

    async fn find_synced_events(&self, owner_id: &str, calendar_id: &str) -> Result<Vec<LocalEvent>> {
        events::find_synced(&self.pool, owner_id, calendar_id).await
    }

    async fn insert_event(&self, event: &LocalEvent) -> Result<()> {
        events::insert(&self.pool, event).await
    }

    async fn update_synced_fields(&self, event_id: &str, fields: &SyncedFields) -> Result<()> {
        events::update_synced_fields(&self.pool, event_id, fields).await
    }

    async fn soft_delete_event(&self, event_id: &str, at: DateTime<Utc>) -> Result<()> {
        events::soft_delete(&self.pool, event_id, at).await
    }
}

async fn run_schema(pool: &SqlitePool) -> Result<()> {
    let schema = include_str!("schema.sql");

    let mut current_statement = String::new();
    for line in schema.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }

        current_statement.push_str(line);
        current_statement.push('\n');

        if trimmed.ends_with(';') {
            sqlx::query(&current_statement).execute(pool).await?;
            current_statement.clear();
        }
    }
    Ok(())
}
