pub mod comments;
pub mod likes;
pub mod models;
pub mod ratings;
pub mod schema;
pub mod seed;
pub mod stories;
pub mod users;

use std::{str::FromStr, time::Duration};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

use crate::config::DatabaseConfig;

pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    // Every connection to an in-memory database is a separate database
    let pool = if config.url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        // WAL lets readers proceed while a writer holds the lock
        SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options.journal_mode(SqliteJournalMode::Wal))
            .await?
    };

    schema::create_tables(&pool).await?;
    Ok(pool)
}

#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    connect(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    })
    .await
    .expect("in-memory database")
}

/// Inserts a user with a placeholder hash; returns its id.
#[cfg(test)]
pub async fn test_user(pool: &SqlitePool, username: &str) -> i64 {
    let mut conn = pool.acquire().await.expect("connection");
    let id = users::insert_user(
        &mut conn,
        &models::NewUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "not-a-real-hash".to_string(),
            display_name: None,
            bio: None,
            email_verified: false,
        },
    )
    .await
    .expect("insert user");
    users::add_role(&mut conn, id, models::ROLE_USER)
        .await
        .expect("add role");
    id
}
