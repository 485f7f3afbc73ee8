use serde::Deserialize;
use sqlx::SqlitePool;
use validator::Validate;

use crate::db::{models::User, users};
use crate::error::{AppError, Result};
use crate::services::begin_write;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProfileInput {
    #[validate(length(max = 100, message = "Display name must be less than 100 characters"))]
    pub display_name: Option<String>,
    #[validate(length(max = 2000, message = "Bio must be at most 2000 characters"))]
    pub bio: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    db: SqlitePool,
}

impl UserService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        let mut conn = self.db.acquire().await?;
        Ok(users::list_all(&mut conn).await?)
    }

    pub async fn get(&self, id: i64) -> Result<User> {
        let mut conn = self.db.acquire().await?;
        users::find_by_id(&mut conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn get_by_username(&self, username: &str) -> Result<User> {
        let mut conn = self.db.acquire().await?;
        users::find_by_username(&mut conn, username)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    /// Blank values clear the field.
    pub async fn update_profile(&self, user: &User, input: ProfileInput) -> Result<User> {
        input.validate()?;

        let display_name = input.display_name.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let bio = input.bio.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let mut tx = begin_write(&self.db).await?;
        if !users::update_profile(&mut tx, user.id, display_name, bio).await? {
            return Err(AppError::not_found("User"));
        }
        let updated = users::find_by_id(&mut tx, user.id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;
        tx.commit().await?;

        tracing::info!(user_id = user.id, "profile updated");
        Ok(updated)
    }
}
