use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use crate::api::dto::{CommentDto, LikeStatusDto};
use crate::api::extract::{ApiPath, ApiQuery, AuthUser, MaybeAuthUser, ValidatedJson};
use crate::api::server::AppState;
use crate::error::Result;
use crate::services::comments::{CommentInput, NewCommentInput};

#[derive(Debug, Deserialize)]
pub struct CommentsQuery {
    pub story_id: i64,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    viewer: MaybeAuthUser,
    ApiQuery(query): ApiQuery<CommentsQuery>,
) -> Result<Json<Vec<CommentDto>>> {
    let comments = state.comments.list_for_story(query.story_id, viewer.user()).await?;
    Ok(Json(comments.into_iter().map(CommentDto::from).collect()))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    viewer: MaybeAuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<CommentDto>> {
    Ok(Json(state.comments.get(id, viewer.user()).await?.into()))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidatedJson(payload): ValidatedJson<NewCommentInput>,
) -> Result<(StatusCode, Json<CommentDto>)> {
    let comment = state.comments.create(&user, payload).await?;
    Ok((StatusCode::CREATED, Json(comment.into())))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ValidatedJson(payload): ValidatedJson<CommentInput>,
) -> Result<Json<CommentDto>> {
    Ok(Json(state.comments.update(id, &user, payload).await?.into()))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode> {
    state.comments.delete(id, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<LikeStatusDto>> {
    Ok(Json(state.likes.toggle_comment_like(id, &user).await?.into()))
}

pub async fn unlike(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<LikeStatusDto>> {
    Ok(Json(state.likes.unlike_comment(id, &user).await?.into()))
}
