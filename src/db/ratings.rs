use chrono::Utc;
use sqlx::SqliteConnection;

/// Inserts or replaces the user's rating of a story.
pub async fn upsert_rating(
    conn: &mut SqliteConnection,
    user_id: i64,
    story_id: i64,
    value: f64,
) -> Result<(), sqlx::Error> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT INTO story_ratings (user_id, story_id, value, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT (user_id, story_id)
        DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(story_id)
    .bind(value)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Zero when the story has no ratings.
pub async fn average_for_story(conn: &mut SqliteConnection, story_id: i64) -> Result<f64, sqlx::Error> {
    sqlx::query_scalar("SELECT COALESCE(AVG(value), 0.0) FROM story_ratings WHERE story_id = ?")
        .bind(story_id)
        .fetch_one(&mut *conn)
        .await
}

pub async fn rating_by_user(
    conn: &mut SqliteConnection,
    user_id: i64,
    story_id: i64,
) -> Result<Option<f64>, sqlx::Error> {
    sqlx::query_scalar("SELECT value FROM story_ratings WHERE user_id = ? AND story_id = ?")
        .bind(user_id)
        .bind(story_id)
        .fetch_optional(&mut *conn)
        .await
}
