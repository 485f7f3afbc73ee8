use sqlx::{SqliteConnection, SqlitePool};

use crate::db::{comments, likes, models::User, stories};
use crate::error::{AppError, Result};
use crate::services::{begin_write, stories::load_visible};

/// Whether the caller likes the target, and its like count afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeStatus {
    pub liked: bool,
    pub likes: i64,
}

#[derive(Clone)]
pub struct LikeService {
    db: SqlitePool,
}

/// Comments on drafts the viewer cannot see are reported missing.
async fn ensure_comment_visible(
    conn: &mut SqliteConnection,
    comment_id: i64,
    viewer: i64,
) -> Result<()> {
    let comment = comments::find_by_id(conn, comment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment"))?;
    match load_visible(conn, comment.story_id, Some(viewer)).await {
        Ok(_) => Ok(()),
        Err(AppError::NotFound(_)) => Err(AppError::not_found("Comment")),
        Err(err) => Err(err),
    }
}

impl LikeService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Idempotent: liking twice counts once.
    pub async fn like_story(&self, story_id: i64, user: &User) -> Result<LikeStatus> {
        let mut tx = begin_write(&self.db).await?;
        load_visible(&mut tx, story_id, Some(user.id)).await?;

        if likes::insert_story_like(&mut tx, user.id, story_id).await? {
            stories::adjust_likes(&mut tx, story_id, 1).await?;
            tracing::info!(story_id, user_id = user.id, "story liked");
        }
        let likes = stories::likes_count(&mut tx, story_id).await?;
        tx.commit().await?;

        Ok(LikeStatus { liked: true, likes })
    }

    pub async fn unlike_story(&self, story_id: i64, user: &User) -> Result<LikeStatus> {
        let mut tx = begin_write(&self.db).await?;
        load_visible(&mut tx, story_id, Some(user.id)).await?;

        if likes::delete_story_like(&mut tx, user.id, story_id).await? {
            stories::adjust_likes(&mut tx, story_id, -1).await?;
            tracing::info!(story_id, user_id = user.id, "story unliked");
        }
        let likes = stories::likes_count(&mut tx, story_id).await?;
        tx.commit().await?;

        Ok(LikeStatus { liked: false, likes })
    }

    pub async fn toggle_story_like(&self, story_id: i64, user: &User) -> Result<LikeStatus> {
        let mut tx = begin_write(&self.db).await?;
        load_visible(&mut tx, story_id, Some(user.id)).await?;

        let liked = if likes::delete_story_like(&mut tx, user.id, story_id).await? {
            stories::adjust_likes(&mut tx, story_id, -1).await?;
            false
        } else {
            likes::insert_story_like(&mut tx, user.id, story_id).await?;
            stories::adjust_likes(&mut tx, story_id, 1).await?;
            true
        };
        let likes = stories::likes_count(&mut tx, story_id).await?;
        tx.commit().await?;

        tracing::info!(story_id, user_id = user.id, liked, "story like toggled");
        Ok(LikeStatus { liked, likes })
    }

    /// Reads the like count from the join table rather than the counter.
    pub async fn story_like_status(&self, story_id: i64, user: &User) -> Result<LikeStatus> {
        let mut conn = self.db.acquire().await?;
        load_visible(&mut conn, story_id, Some(user.id)).await?;

        Ok(LikeStatus {
            liked: likes::has_liked_story(&mut conn, user.id, story_id).await?,
            likes: likes::count_story_likes(&mut conn, story_id).await?,
        })
    }

    pub async fn toggle_comment_like(&self, comment_id: i64, user: &User) -> Result<LikeStatus> {
        let mut tx = begin_write(&self.db).await?;
        ensure_comment_visible(&mut tx, comment_id, user.id).await?;

        let liked = if likes::delete_comment_like(&mut tx, user.id, comment_id).await? {
            comments::adjust_likes(&mut tx, comment_id, -1).await?;
            false
        } else {
            likes::insert_comment_like(&mut tx, user.id, comment_id).await?;
            comments::adjust_likes(&mut tx, comment_id, 1).await?;
            true
        };
        let likes = comments::likes_count(&mut tx, comment_id).await?;
        tx.commit().await?;

        tracing::info!(comment_id, user_id = user.id, liked, "comment like toggled");
        Ok(LikeStatus { liked, likes })
    }

    pub async fn unlike_comment(&self, comment_id: i64, user: &User) -> Result<LikeStatus> {
        let mut tx = begin_write(&self.db).await?;
        ensure_comment_visible(&mut tx, comment_id, user.id).await?;

        if likes::delete_comment_like(&mut tx, user.id, comment_id).await? {
            comments::adjust_likes(&mut tx, comment_id, -1).await?;
        }
        let likes = comments::likes_count(&mut tx, comment_id).await?;
        tx.commit().await?;

        Ok(LikeStatus { liked: false, likes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::{self, models::StoryDraft, test_pool, test_user, users};

    struct Setup {
        pool: SqlitePool,
        service: LikeService,
        author: User,
        reader: User,
        story_id: i64,
    }

    async fn setup(published: bool) -> Setup {
        let pool = test_pool().await;
        let author_id = test_user(&pool, "author").await;
        let reader_id = test_user(&pool, "reader").await;

        let mut conn = pool.acquire().await.unwrap();
        let story_id = stories::insert_story(
            &mut conn,
            author_id,
            &StoryDraft {
                title: "Likeable".to_string(),
                description: "Very likeable indeed".to_string(),
                content: "The most likeable content".to_string(),
                tags: vec![],
                published,
            },
        )
        .await
        .unwrap();
        let author = users::find_by_id(&mut conn, author_id).await.unwrap().unwrap();
        let reader = users::find_by_id(&mut conn, reader_id).await.unwrap().unwrap();
        drop(conn);

        Setup {
            service: LikeService::new(pool.clone()),
            pool,
            author,
            reader,
            story_id,
        }
    }

    #[tokio::test]
    async fn test_liking_twice_counts_once() {
        let s = setup(true).await;

        s.service.like_story(s.story_id, &s.reader).await.unwrap();
        let again = s.service.like_story(s.story_id, &s.reader).await.unwrap();
        assert_eq!(again, LikeStatus { liked: true, likes: 1 });

        let by_author = s.service.like_story(s.story_id, &s.author).await.unwrap();
        assert_eq!(by_author.likes, 2);

        let status = s.service.story_like_status(s.story_id, &s.reader).await.unwrap();
        assert_eq!(status, LikeStatus { liked: true, likes: 2 });
    }

    #[tokio::test]
    async fn test_unlike_never_goes_negative() {
        let s = setup(true).await;

        let status = s.service.unlike_story(s.story_id, &s.reader).await.unwrap();
        assert_eq!(status, LikeStatus { liked: false, likes: 0 });

        s.service.like_story(s.story_id, &s.reader).await.unwrap();
        let status = s.service.unlike_story(s.story_id, &s.reader).await.unwrap();
        assert_eq!(status.likes, 0);
    }

    #[tokio::test]
    async fn test_toggle_keeps_counter_in_step() {
        let s = setup(true).await;

        let on = s.service.toggle_story_like(s.story_id, &s.reader).await.unwrap();
        assert_eq!(on, LikeStatus { liked: true, likes: 1 });
        let off = s.service.toggle_story_like(s.story_id, &s.reader).await.unwrap();
        assert_eq!(off, LikeStatus { liked: false, likes: 0 });

        let mut conn = s.pool.acquire().await.unwrap();
        assert_eq!(
            stories::likes_count(&mut conn, s.story_id).await.unwrap(),
            likes::count_story_likes(&mut conn, s.story_id).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_cannot_like_hidden_draft() {
        let s = setup(false).await;
        assert!(matches!(
            s.service.like_story(s.story_id, &s.reader).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            s.service.toggle_story_like(9999, &s.reader).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_comment_like_toggle() {
        let s = setup(true).await;
        let comment_id = {
            let mut conn = s.pool.acquire().await.unwrap();
            comments::insert_comment(&mut conn, s.story_id, s.author.id, "Nice")
                .await
                .unwrap()
        };

        let on = s.service.toggle_comment_like(comment_id, &s.reader).await.unwrap();
        assert_eq!(on, LikeStatus { liked: true, likes: 1 });

        let mut conn = s.pool.acquire().await.unwrap();
        assert!(likes::has_liked_comment(&mut conn, s.reader.id, comment_id).await.unwrap());
        drop(conn);

        let off = s.service.unlike_comment(comment_id, &s.reader).await.unwrap();
        assert_eq!(off, LikeStatus { liked: false, likes: 0 });
        assert!(matches!(
            s.service.toggle_comment_like(777, &s.reader).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_broken_story_lookup_is_not_reported_missing() {
        let s = setup(true).await;
        let mut conn = s.pool.acquire().await.unwrap();
        let comment_id = comments::insert_comment(&mut conn, s.story_id, s.reader.id, "nice")
            .await
            .unwrap();
        sqlx::query("DROP TABLE story_tags").execute(&mut *conn).await.unwrap();
        drop(conn);

        let result = s.service.toggle_comment_like(comment_id, &s.author).await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_likes_on_file_database() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("storyhub-likes-{}-{nanos}.db", std::process::id()));
        let pool = db::connect(&DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 8,
        })
        .await
        .unwrap();

        let author_id = test_user(&pool, "author").await;
        let mut fans = Vec::new();
        let mut conn = pool.acquire().await.unwrap();
        let story_id = stories::insert_story(
            &mut conn,
            author_id,
            &StoryDraft {
                title: "Crowd Pleaser".to_string(),
                description: "Everyone wants in".to_string(),
                content: "Liked by many at once".to_string(),
                tags: vec![],
                published: true,
            },
        )
        .await
        .unwrap();
        drop(conn);
        for i in 0..16 {
            let id = test_user(&pool, &format!("fan{i}")).await;
            let mut conn = pool.acquire().await.unwrap();
            fans.push(users::find_by_id(&mut conn, id).await.unwrap().unwrap());
        }

        let service = LikeService::new(pool.clone());
        let handles: Vec<_> = fans
            .into_iter()
            .map(|fan| {
                let service = service.clone();
                tokio::spawn(async move { service.like_story(story_id, &fan).await })
            })
            .collect();

        let mut failures = 0;
        for handle in handles {
            if handle.await.unwrap().is_err() {
                failures += 1;
            }
        }
        assert_eq!(failures, 0);

        let mut conn = pool.acquire().await.unwrap();
        assert_eq!(stories::likes_count(&mut conn, story_id).await.unwrap(), 16);
        assert_eq!(likes::count_story_likes(&mut conn, story_id).await.unwrap(), 16);
        drop(conn);

        pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
