use std::sync::Arc;

use axum::{Json, extract::State};

use crate::api::dto::LikeStatusDto;
use crate::api::extract::{ApiPath, AuthUser};
use crate::api::server::AppState;
use crate::error::Result;

pub async fn toggle_story(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(story_id): ApiPath<i64>,
) -> Result<Json<LikeStatusDto>> {
    Ok(Json(state.likes.toggle_story_like(story_id, &user).await?.into()))
}

pub async fn status(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(story_id): ApiPath<i64>,
) -> Result<Json<LikeStatusDto>> {
    Ok(Json(state.likes.story_like_status(story_id, &user).await?.into()))
}

pub async fn like(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(story_id): ApiPath<i64>,
) -> Result<Json<LikeStatusDto>> {
    Ok(Json(state.likes.like_story(story_id, &user).await?.into()))
}

pub async fn unlike(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(story_id): ApiPath<i64>,
) -> Result<Json<LikeStatusDto>> {
    Ok(Json(state.likes.unlike_story(story_id, &user).await?.into()))
}
