use chrono::{DateTime, Utc};
use sqlx::FromRow;

pub const ROLE_USER: &str = "ROLE_USER";

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub enabled: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub email_verified: bool,
}

/// A story row joined with its author's public fields.
#[derive(Debug, Clone, FromRow)]
pub struct Story {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub content: String,
    pub author_id: i64,
    pub author_username: String,
    pub author_display_name: Option<String>,
    pub published: bool,
    pub views: i64,
    pub likes: i64,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub tags: Vec<String>,
}

impl Story {
    pub fn is_authored_by(&self, user_id: i64) -> bool {
        self.author_id == user_id
    }

    /// Unpublished stories are only visible to their author.
    pub fn is_visible_to(&self, viewer: Option<i64>) -> bool {
        self.published || viewer.is_some_and(|id| self.is_authored_by(id))
    }
}

/// Author-supplied story fields, already validated and normalized.
#[derive(Debug, Clone)]
pub struct StoryDraft {
    pub title: String,
    pub description: String,
    pub content: String,
    pub tags: Vec<String>,
    pub published: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub author_id: i64,
    pub author_username: String,
    pub author_display_name: Option<String>,
    pub story_id: i64,
    pub edited: bool,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_authored_by(&self, user_id: i64) -> bool {
        self.author_id == user_id
    }
}

/// Zero-based page request with a clamped page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub const DEFAULT_SIZE: u32 = 9;
    pub const MAX_SIZE: u32 = 100;

    pub fn new(page: Option<u32>, size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(0),
            size: size.unwrap_or(Self::DEFAULT_SIZE).clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page) * i64::from(self.size)
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub request: PageRequest,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> i64 {
        let size = i64::from(self.request.size);
        (self.total + size - 1) / size
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            request: self.request,
            total: self.total,
        }
    }
}
