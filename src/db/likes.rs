//! Join rows recording a user's like on a story or a comment.
//!
//! Inserts and deletes report whether a row actually changed so callers can
//! keep the denormalized counters in step.
use std::collections::HashSet;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

pub async fn insert_story_like(
    conn: &mut SqliteConnection,
    user_id: i64,
    story_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO story_likes (user_id, story_id, created_at) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(story_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn delete_story_like(
    conn: &mut SqliteConnection,
    user_id: i64,
    story_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM story_likes WHERE user_id = ? AND story_id = ?")
        .bind(user_id)
        .bind(story_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn has_liked_story(
    conn: &mut SqliteConnection,
    user_id: i64,
    story_id: i64,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM story_likes WHERE user_id = ? AND story_id = ?)")
        .bind(user_id)
        .bind(story_id)
        .fetch_one(&mut *conn)
        .await
}

/// The subset of `story_ids` that `user_id` has liked.
pub async fn liked_story_ids(
    conn: &mut SqliteConnection,
    user_id: i64,
    story_ids: &[i64],
) -> Result<HashSet<i64>, sqlx::Error> {
    if story_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let mut qb = QueryBuilder::<Sqlite>::new("SELECT story_id FROM story_likes WHERE user_id = ");
    qb.push_bind(user_id).push(" AND story_id IN (");
    let mut ids = qb.separated(", ");
    for id in story_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(")");

    let liked: Vec<i64> = qb.build_query_scalar().fetch_all(&mut *conn).await?;
    Ok(liked.into_iter().collect())
}

pub async fn count_story_likes(conn: &mut SqliteConnection, story_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM story_likes WHERE story_id = ?")
        .bind(story_id)
        .fetch_one(&mut *conn)
        .await
}

pub async fn insert_comment_like(
    conn: &mut SqliteConnection,
    user_id: i64,
    comment_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT OR IGNORE INTO comment_likes (user_id, comment_id, created_at) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(comment_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn delete_comment_like(
    conn: &mut SqliteConnection,
    user_id: i64,
    comment_id: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM comment_likes WHERE user_id = ? AND comment_id = ?")
        .bind(user_id)
        .bind(comment_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn has_liked_comment(
    conn: &mut SqliteConnection,
    user_id: i64,
    comment_id: i64,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM comment_likes WHERE user_id = ? AND comment_id = ?)",
    )
    .bind(user_id)
    .bind(comment_id)
    .fetch_one(&mut *conn)
    .await
}

/// Ids of the comments on `story_id` that `user_id` has liked.
pub async fn liked_comment_ids(
    conn: &mut SqliteConnection,
    user_id: i64,
    story_id: i64,
) -> Result<HashSet<i64>, sqlx::Error> {
    let ids: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT cl.comment_id
        FROM comment_likes cl
        JOIN comments c ON c.id = cl.comment_id
        WHERE cl.user_id = ? AND c.story_id = ?
        "#,
    )
    .bind(user_id)
    .bind(story_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(ids.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{models::StoryDraft, stories, test_pool, test_user};

    #[tokio::test]
    async fn test_liked_story_ids_only_returns_requested_likes() {
        let pool = test_pool().await;
        let author = test_user(&pool, "author").await;
        let reader = test_user(&pool, "reader").await;
        let mut conn = pool.acquire().await.unwrap();

        let mut ids = Vec::new();
        for title in ["One", "Two", "Three"] {
            let draft = StoryDraft {
                title: title.to_string(),
                description: format!("{title} description"),
                content: format!("{title} content"),
                tags: vec![],
                published: true,
            };
            ids.push(stories::insert_story(&mut conn, author, &draft).await.unwrap());
        }
        insert_story_like(&mut conn, reader, ids[0]).await.unwrap();
        insert_story_like(&mut conn, reader, ids[2]).await.unwrap();
        insert_story_like(&mut conn, author, ids[1]).await.unwrap();

        let liked = liked_story_ids(&mut conn, reader, &ids).await.unwrap();
        assert_eq!(liked, HashSet::from([ids[0], ids[2]]));

        let liked = liked_story_ids(&mut conn, reader, &ids[1..2]).await.unwrap();
        assert!(liked.is_empty());
        assert!(liked_story_ids(&mut conn, reader, &[]).await.unwrap().is_empty());
    }
}
