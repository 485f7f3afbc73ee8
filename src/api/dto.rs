use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::models::{Comment, Page, Story, User};
use crate::services::{comments::CommentView, likes::LikeStatus, stories::StoryView};

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub email_verified: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            display_name: user.display_name,
            bio: user.bio,
            email_verified: user.email_verified,
            roles: user.roles,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserDto,
}

#[derive(Debug, Serialize)]
pub struct AuthorDto {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StoryDto {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub content: String,
    pub author: AuthorDto,
    pub published: bool,
    pub views: i64,
    pub likes: i64,
    pub rating: f64,
    pub tags: Vec<String>,
    pub liked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoryView> for StoryDto {
    fn from(view: StoryView) -> Self {
        let StoryView {
            story,
            liked,
            my_rating,
        } = view;

        Self {
            id: story.id,
            title: story.title,
            description: story.description,
            content: story.content,
            author: AuthorDto {
                id: story.author_id,
                username: story.author_username,
                display_name: story.author_display_name,
            },
            published: story.published,
            views: story.views,
            likes: story.likes,
            rating: story.rating,
            tags: story.tags,
            liked,
            my_rating,
            created_at: story.created_at,
            updated_at: story.updated_at,
        }
    }
}

/// For responses where the caller's like flag is not looked up.
impl From<Story> for StoryDto {
    fn from(story: Story) -> Self {
        StoryView {
            story,
            liked: false,
            my_rating: None,
        }
        .into()
    }
}

#[derive(Debug, Serialize)]
pub struct CommentDto {
    pub id: i64,
    pub content: String,
    pub author: AuthorDto,
    pub story_id: i64,
    pub edited: bool,
    pub likes: i64,
    pub liked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CommentView> for CommentDto {
    fn from(view: CommentView) -> Self {
        let CommentView { comment, liked } = view;
        Self {
            id: comment.id,
            content: comment.content,
            author: AuthorDto {
                id: comment.author_id,
                username: comment.author_username,
                display_name: comment.author_display_name,
            },
            story_id: comment.story_id,
            edited: comment.edited,
            likes: comment.likes,
            liked,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

impl From<Comment> for CommentDto {
    fn from(comment: Comment) -> Self {
        CommentView {
            comment,
            liked: false,
        }
        .into()
    }
}

#[derive(Debug, Serialize)]
pub struct PageDto<T> {
    pub content: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: i64,
    pub total_pages: i64,
}

impl<T> PageDto<T> {
    pub fn from_page<U>(page: Page<U>) -> Self
    where
        T: From<U>,
    {
        let total_pages = page.total_pages();
        let page = page.map(T::from);
        Self {
            page: page.request.page,
            size: page.request.size,
            total_elements: page.total,
            total_pages,
            content: page.items,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LikeStatusDto {
    pub liked: bool,
    pub likes: i64,
}

impl From<LikeStatus> for LikeStatusDto {
    fn from(status: LikeStatus) -> Self {
        Self {
            liked: status.liked,
            likes: status.likes,
        }
    }
}
