use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use validator::Validate;

use crate::db::{
    comments, likes,
    models::{Comment, User},
};
use crate::error::{AppError, Result};
use crate::services::{begin_write, stories::load_visible, validation::not_blank};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewCommentInput {
    pub story_id: i64,
    #[validate(
        length(min = 1, max = 1000, message = "Comment must be between 1 and 1000 characters"),
        custom(function = "not_blank")
    )]
    pub content: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CommentInput {
    #[validate(
        length(min = 1, max = 1000, message = "Comment must be between 1 and 1000 characters"),
        custom(function = "not_blank")
    )]
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub comment: Comment,
    pub liked: bool,
}

#[derive(Clone)]
pub struct CommentService {
    db: SqlitePool,
}

async fn load_comment(conn: &mut SqliteConnection, id: i64) -> Result<Comment> {
    comments::find_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment"))
}

fn ensure_author(comment: &Comment, user: &User, action: &str) -> Result<()> {
    if comment.is_authored_by(user.id) {
        return Ok(());
    }
    tracing::warn!(comment_id = comment.id, user_id = user.id, action, "ownership check failed");
    Err(AppError::Forbidden(format!(
        "You are not authorized to {action} this comment"
    )))
}

impl CommentService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Comments of a story the viewer can see, newest first.
    pub async fn list_for_story(&self, story_id: i64, viewer: Option<&User>) -> Result<Vec<CommentView>> {
        let viewer_id = viewer.map(|u| u.id);
        let mut conn = self.db.acquire().await?;
        load_visible(&mut conn, story_id, viewer_id).await?;

        let rows = comments::list_by_story(&mut conn, story_id).await?;
        let liked = match viewer_id {
            Some(user_id) => likes::liked_comment_ids(&mut conn, user_id, story_id).await?,
            None => Default::default(),
        };

        Ok(rows
            .into_iter()
            .map(|comment| CommentView {
                liked: liked.contains(&comment.id),
                comment,
            })
            .collect())
    }

    pub async fn get(&self, id: i64, viewer: Option<&User>) -> Result<CommentView> {
        let viewer_id = viewer.map(|u| u.id);
        let mut conn = self.db.acquire().await?;
        let comment = load_comment(&mut conn, id).await?;
        // A comment on a hidden draft is as missing as the draft itself
        match load_visible(&mut conn, comment.story_id, viewer_id).await {
            Ok(_) => {}
            Err(AppError::NotFound(_)) => return Err(AppError::not_found("Comment")),
            Err(err) => return Err(err),
        }

        let liked = match viewer_id {
            Some(user_id) => likes::has_liked_comment(&mut conn, user_id, id).await?,
            None => false,
        };
        Ok(CommentView { comment, liked })
    }

    pub async fn create(&self, author: &User, input: NewCommentInput) -> Result<Comment> {
        input.validate()?;

        let mut tx = begin_write(&self.db).await?;
        load_visible(&mut tx, input.story_id, Some(author.id)).await?;
        let id = comments::insert_comment(&mut tx, input.story_id, author.id, input.content.trim())
            .await?;
        let comment = load_comment(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(comment_id = id, story_id = input.story_id, author_id = author.id, "comment created");
        Ok(comment)
    }

    pub async fn update(&self, id: i64, user: &User, input: CommentInput) -> Result<Comment> {
        input.validate()?;

        let mut tx = begin_write(&self.db).await?;
        let existing = load_comment(&mut tx, id).await?;
        ensure_author(&existing, user, "update")?;

        comments::update_content(&mut tx, id, input.content.trim()).await?;
        let comment = load_comment(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(comment_id = id, "comment updated");
        Ok(comment)
    }

    pub async fn delete(&self, id: i64, user: &User) -> Result<()> {
        let mut tx = begin_write(&self.db).await?;
        let existing = load_comment(&mut tx, id).await?;
        ensure_author(&existing, user, "delete")?;

        comments::delete_comment(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(comment_id = id, "comment deleted");
        Ok(())
    }
}
