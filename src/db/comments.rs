use chrono::Utc;
use sqlx::SqliteConnection;

use crate::db::models::Comment;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.content, c.author_id,
           u.username AS author_username, u.display_name AS author_display_name,
           c.story_id, c.edited, c.likes, c.created_at, c.updated_at
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

pub async fn insert_comment(
    conn: &mut SqliteConnection,
    story_id: i64,
    author_id: i64,
    content: &str,
) -> Result<i64, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO comments (content, author_id, story_id, edited, likes, created_at, updated_at)
        VALUES (?, ?, ?, 0, 0, ?, ?)
        "#,
    )
    .bind(content)
    .bind(author_id)
    .bind(story_id)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!("{COMMENT_SELECT} WHERE c.id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Newest first.
pub async fn list_by_story(
    conn: &mut SqliteConnection,
    story_id: i64,
) -> Result<Vec<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!(
        "{COMMENT_SELECT} WHERE c.story_id = ? ORDER BY c.created_at DESC, c.id DESC"
    ))
    .bind(story_id)
    .fetch_all(&mut *conn)
    .await
}

/// Replaces the content and marks the comment as edited.
pub async fn update_content(
    conn: &mut SqliteConnection,
    id: i64,
    content: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE comments
        SET content = ?, edited = 1, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(content)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn delete_comment(conn: &mut SqliteConnection, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn adjust_likes(conn: &mut SqliteConnection, id: i64, delta: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE comments SET likes = MAX(likes + ?, 0) WHERE id = ?")
        .bind(delta)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn likes_count(conn: &mut SqliteConnection, id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT likes FROM comments WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
}
