use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use validator::Validate;

use crate::db::{
    likes,
    models::{Page, PageRequest, Story, StoryDraft, User},
    ratings,
    stories::{self, StoryFilter, StorySort},
    users,
};
use crate::error::{AppError, Result};
use crate::services::{
    begin_write,
    validation::{normalize_tags, not_blank, valid_tags},
};

const TOP_LIMIT: i64 = 10;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StoryInput {
    #[validate(
        length(min = 3, max = 100, message = "Title must be between 3 and 100 characters"),
        custom(function = "not_blank")
    )]
    pub title: String,
    #[validate(
        length(min = 10, max = 1000, message = "Description must be between 10 and 1000 characters"),
        custom(function = "not_blank")
    )]
    pub description: String,
    #[validate(
        length(min = 10, max = 10000, message = "Content must be between 10 and 10000 characters"),
        custom(function = "not_blank")
    )]
    pub content: String,
    #[serde(default)]
    #[validate(custom(function = "valid_tags"))]
    pub tags: Vec<String>,
    /// Absent on update means "leave as is"
    pub published: Option<bool>,
}

impl StoryInput {
    fn into_draft(self, current_published: bool) -> StoryDraft {
        StoryDraft {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            content: self.content,
            tags: normalize_tags(&self.tags),
            published: self.published.unwrap_or(current_published),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RatingInput {
    #[validate(range(min = 0.0, max = 5.0, message = "Rating must be between 0 and 5"))]
    pub rating: f64,
}

/// A story as seen by one viewer.
#[derive(Debug, Clone)]
pub struct StoryView {
    pub story: Story,
    pub liked: bool,
    pub my_rating: Option<f64>,
}

#[derive(Clone)]
pub struct StoryService {
    db: SqlitePool,
}

fn ensure_author(story: &Story, user: &User, action: &str) -> Result<()> {
    if story.is_authored_by(user.id) {
        Ok(())
    } else {
        tracing::warn!(story_id = story.id, user_id = user.id, action, "ownership check failed");
        Err(AppError::Forbidden(format!(
            "You are not authorized to {action} this story"
        )))
    }
}

/// Loads a story the viewer may see; hidden drafts look missing.
pub(crate) async fn load_visible(
    conn: &mut SqliteConnection,
    id: i64,
    viewer: Option<i64>,
) -> Result<Story> {
    match stories::find_by_id(conn, id).await? {
        Some(story) if story.is_visible_to(viewer) => Ok(story),
        _ => Err(AppError::not_found("Story")),
    }
}

async fn load_existing(conn: &mut SqliteConnection, id: i64) -> Result<Story> {
    stories::find_by_id(conn, id)
        .await?
        .ok_or_else(|| AppError::not_found("Story"))
}

impl StoryService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create(&self, author: &User, input: StoryInput) -> Result<Story> {
        input.validate()?;
        let draft = input.into_draft(false);

        let mut tx = begin_write(&self.db).await?;
        let id = stories::insert_story(&mut tx, author.id, &draft).await?;
        let story = load_existing(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(story_id = id, author_id = author.id, "story created");
        Ok(story)
    }

    pub async fn get(&self, id: i64, viewer: Option<&User>) -> Result<StoryView> {
        let viewer_id = viewer.map(|u| u.id);
        let mut conn = self.db.acquire().await?;
        let story = load_visible(&mut conn, id, viewer_id).await?;

        let (liked, my_rating) = match viewer_id {
            Some(user_id) => (
                likes::has_liked_story(&mut conn, user_id, id).await?,
                ratings::rating_by_user(&mut conn, user_id, id).await?,
            ),
            None => (false, None),
        };

        Ok(StoryView {
            story,
            liked,
            my_rating,
        })
    }

    /// Attaches the viewer's like flag to each story.
    pub async fn annotate(&self, stories: Vec<Story>, viewer: Option<&User>) -> Result<Vec<StoryView>> {
        let Some(viewer) = viewer else {
            return Ok(stories
                .into_iter()
                .map(|story| StoryView {
                    story,
                    liked: false,
                    my_rating: None,
                })
                .collect());
        };

        let ids: Vec<i64> = stories.iter().map(|story| story.id).collect();
        let mut conn = self.db.acquire().await?;
        let liked = likes::liked_story_ids(&mut conn, viewer.id, &ids).await?;

        Ok(stories
            .into_iter()
            .map(|story| StoryView {
                liked: liked.contains(&story.id),
                story,
                my_rating: None,
            })
            .collect())
    }

    /// Published stories only.
    pub async fn list(
        &self,
        sort: StorySort,
        tag: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Story>> {
        let tag = tag.map(|t| t.trim().to_lowercase()).filter(|t| !t.is_empty());
        let filter = match tag.as_deref() {
            Some(tag) => StoryFilter::Tag(tag),
            None => StoryFilter::All,
        };

        let mut conn = self.db.acquire().await?;
        let result = stories::list_published(&mut conn, filter, sort, page).await?;
        tracing::debug!(?sort, total = result.total, "listed stories");
        Ok(result)
    }

    pub async fn search(&self, query: &str, page: PageRequest) -> Result<Page<Story>> {
        let query = query.trim();
        if query.is_empty() {
            let mut errors = validator::ValidationErrors::new();
            let mut err = validator::ValidationError::new("blank");
            err.message = Some("Search query is required".into());
            errors.add("query", err);
            return Err(AppError::Validation(errors));
        }

        let mut conn = self.db.acquire().await?;
        let result =
            stories::list_published(&mut conn, StoryFilter::Search(query), StorySort::Newest, page)
                .await?;
        tracing::debug!(query, total = result.total, "searched stories");
        Ok(result)
    }

    /// Drafts are included only when the viewer is the author.
    pub async fn by_author(&self, author_id: i64, viewer: Option<&User>) -> Result<Vec<Story>> {
        let mut conn = self.db.acquire().await?;
        if users::find_by_id(&mut conn, author_id).await?.is_none() {
            return Err(AppError::not_found("User"));
        }

        let include_drafts = viewer.is_some_and(|u| u.id == author_id);
        Ok(stories::list_by_author(&mut conn, author_id, include_drafts).await?)
    }

    pub async fn top_rated(&self) -> Result<Vec<Story>> {
        let mut conn = self.db.acquire().await?;
        Ok(stories::top_published(&mut conn, StorySort::Rating, TOP_LIMIT).await?)
    }

    pub async fn most_viewed(&self) -> Result<Vec<Story>> {
        let mut conn = self.db.acquire().await?;
        Ok(stories::top_published(&mut conn, StorySort::Popular, TOP_LIMIT).await?)
    }

    pub async fn update(&self, id: i64, user: &User, input: StoryInput) -> Result<Story> {
        input.validate()?;

        let mut tx = begin_write(&self.db).await?;
        let existing = load_existing(&mut tx, id).await?;
        ensure_author(&existing, user, "update")?;

        let draft = input.into_draft(existing.published);
        stories::update_story(&mut tx, id, &draft).await?;
        let story = load_existing(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(story_id = id, "story updated");
        Ok(story)
    }

    pub async fn delete(&self, id: i64, user: &User) -> Result<()> {
        let mut tx = begin_write(&self.db).await?;
        let existing = load_existing(&mut tx, id).await?;
        ensure_author(&existing, user, "delete")?;

        stories::delete_story(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(story_id = id, "story deleted");
        Ok(())
    }

    pub async fn publish(&self, id: i64, user: &User) -> Result<Story> {
        self.set_published(id, user, true).await
    }

    pub async fn unpublish(&self, id: i64, user: &User) -> Result<Story> {
        self.set_published(id, user, false).await
    }

    async fn set_published(&self, id: i64, user: &User, published: bool) -> Result<Story> {
        let action = if published { "publish" } else { "unpublish" };

        let mut tx = begin_write(&self.db).await?;
        let existing = load_existing(&mut tx, id).await?;
        ensure_author(&existing, user, action)?;

        stories::set_published(&mut tx, id, published).await?;
        let story = load_existing(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(story_id = id, published, "story visibility changed");
        Ok(story)
    }

    /// Counts a view of a published story.
    pub async fn increment_views(&self, id: i64) -> Result<Story> {
        let mut tx = begin_write(&self.db).await?;
        if !stories::increment_views(&mut tx, id).await? {
            return Err(AppError::not_found("Story"));
        }
        let story = load_existing(&mut tx, id).await?;
        tx.commit().await?;
        Ok(story)
    }

    /// Records the user's rating (replacing an earlier one) and refreshes
    /// the story's average.
    pub async fn rate(&self, id: i64, user: &User, input: RatingInput) -> Result<Story> {
        input.validate()?;

        let mut tx = begin_write(&self.db).await?;
        load_visible(&mut tx, id, Some(user.id)).await?;

        ratings::upsert_rating(&mut tx, user.id, id, input.rating).await?;
        let average = update_rating(&mut tx, id).await?;
        let story = load_existing(&mut tx, id).await?;
        tx.commit().await?;

        tracing::info!(story_id = id, user_id = user.id, average, "story rated");
        Ok(story)
    }
}

/// Recomputes the stored average from the rating rows.
pub(crate) async fn update_rating(conn: &mut SqliteConnection, story_id: i64) -> Result<f64> {
    let average = ratings::average_for_story(conn, story_id).await?;
    stories::set_rating(conn, story_id, average).await?;
    Ok(average)
}
