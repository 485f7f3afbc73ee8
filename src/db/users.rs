use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db::models::{NewUser, User};

const USER_COLUMNS: &str = "id, username, email, password_hash, display_name, bio, enabled, \
                            email_verified, created_at, updated_at";

pub async fn insert_user(conn: &mut SqliteConnection, user: &NewUser) -> Result<i64, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, display_name, bio, enabled,
                           email_verified, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.display_name)
    .bind(&user.bio)
    .bind(user.email_verified)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn add_role(conn: &mut SqliteConnection, user_id: i64, role: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?, ?)")
        .bind(user_id)
        .bind(role)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn roles_for(conn: &mut SqliteConnection, user_id: i64) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = ? ORDER BY role")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
}

async fn with_roles(
    conn: &mut SqliteConnection,
    user: Option<User>,
) -> Result<Option<User>, sqlx::Error> {
    match user {
        Some(mut user) => {
            user.roles = roles_for(conn, user.id).await?;
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    with_roles(conn, user).await
}

pub async fn find_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
    ))
    .bind(username)
    .fetch_optional(&mut *conn)
    .await?;

    with_roles(conn, user).await
}

/// Emails compare case-insensitively (the column is `COLLATE NOCASE`).
pub async fn find_by_email(
    conn: &mut SqliteConnection,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;

    with_roles(conn, user).await
}

pub async fn exists_by_username(conn: &mut SqliteConnection, username: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)")
        .bind(username)
        .fetch_one(&mut *conn)
        .await
}

pub async fn exists_by_email(conn: &mut SqliteConnection, email: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
        .bind(email)
        .fetch_one(&mut *conn)
        .await
}

pub async fn list_all(conn: &mut SqliteConnection) -> Result<Vec<User>, sqlx::Error> {
    let mut users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
        .fetch_all(&mut *conn)
        .await?;

    for user in &mut users {
        user.roles = roles_for(conn, user.id).await?;
    }

    Ok(users)
}

pub async fn update_profile(
    conn: &mut SqliteConnection,
    id: i64,
    display_name: Option<&str>,
    bio: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE users
        SET display_name = ?, bio = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(display_name)
    .bind(bio)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
