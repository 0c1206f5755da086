// file: src/database/users.rs
use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use uuid::Uuid;

use crate::models::User;

pub async fn add(pool: &SqlitePool, email: &str) -> Result<User> {
    let user = User {
        id: Uuid::now_v7().to_string(),
        email: email.to_string(),
        created_at: Utc::now(),
    };

    sqlx::query("INSERT INTO users (id, email, created_at) VALUES (?, ?, ?)")
        .bind(&user.id)
        .bind(&user.email)
        .bind(user.created_at)
        .execute(pool)
        .await?;

    Ok(user)
}

pub async fn exists(pool: &SqlitePool, user_id: &str) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(found.is_some())
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT id, email, created_at FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}
