use std::sync::Arc;

use serde::Deserialize;
use sqlx::SqlitePool;
use validator::Validate;

use crate::db::{
    models::{NewUser, ROLE_USER, User},
    users,
};
use crate::error::{AppError, Result, conflict_on_unique};
use crate::security::{
    jwt::JwtService,
    password::{hash_password, verify_password},
};
use crate::services::{begin_write, validation::not_blank};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(
        length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"),
        custom(function = "not_blank")
    )]
    pub username: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(max = 100, message = "Display name must be less than 100 characters"))]
    pub display_name: Option<String>,
    #[validate(length(max = 2000, message = "Bio must be at most 2000 characters"))]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginInput {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// A user together with a freshly issued bearer token.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

#[derive(Clone)]
pub struct AuthService {
    db: SqlitePool,
    jwt: Arc<JwtService>,
}

impl AuthService {
    pub fn new(db: SqlitePool, jwt: Arc<JwtService>) -> Self {
        Self { db, jwt }
    }

    pub async fn register(&self, input: RegisterInput) -> Result<AuthSession> {
        input.validate()?;

        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();
        let password_hash = hash_off_thread(input.password).await?;

        let mut tx = begin_write(&self.db).await?;

        if users::exists_by_username(&mut tx, &username).await? {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }
        if users::exists_by_email(&mut tx, &email).await? {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let new_user = NewUser {
            username,
            email,
            password_hash,
            display_name: input.display_name.filter(|name| !name.trim().is_empty()),
            bio: input.bio,
            email_verified: false,
        };
        let id = users::insert_user(&mut tx, &new_user)
            .await
            .map_err(|e| conflict_on_unique(e, "Username or email already exists"))?;
        users::add_role(&mut tx, id, ROLE_USER).await?;

        let user = users::find_by_id(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::Internal("registered user vanished".to_string()))?;
        tx.commit().await?;

        tracing::info!(user_id = user.id, username = %user.username, "user registered");
        let token = self.issue_token(&user)?;
        Ok(AuthSession { token, user })
    }

    pub async fn login(&self, input: LoginInput) -> Result<AuthSession> {
        input.validate()?;
        let user = self.authenticate(input.email.trim(), &input.password).await?;
        let token = self.issue_token(&user)?;
        Ok(AuthSession { token, user })
    }

    /// Unknown email, wrong password and disabled accounts are
    /// indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let mut conn = self.db.acquire().await?;
        let Some(user) = users::find_by_email(&mut conn, email).await? else {
            tracing::debug!(email, "login for unknown email");
            return Err(AppError::InvalidCredentials);
        };
        drop(conn);

        let hash = user.password_hash.clone();
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("password check failed: {e}")))?;

        if !matches || !user.enabled {
            tracing::debug!(user_id = user.id, "rejected login");
            return Err(AppError::InvalidCredentials);
        }

        Ok(user)
    }

    pub fn issue_token(&self, user: &User) -> Result<String> {
        self.jwt.issue(user.id, &user.username)
    }

    /// Resolves a bearer token to an enabled user.
    pub async fn validate_token(&self, token: &str) -> Result<User> {
        let claims = self.jwt.verify(token)?;
        let user_id = claims.user_id()?;

        let mut conn = self.db.acquire().await?;
        match users::find_by_id(&mut conn, user_id).await? {
            Some(user) if user.enabled && user.username == claims.username => Ok(user),
            _ => Err(AppError::Unauthorized("Invalid token".to_string())),
        }
    }

    pub fn token_ttl_secs(&self) -> i64 {
        self.jwt.ttl_secs()
    }
}

async fn hash_off_thread(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?
}
