use std::sync::Arc;

use axum::{Json, extract::State};

use crate::api::dto::UserDto;
use crate::api::extract::{ApiPath, AuthUser, ValidatedJson};
use crate::api::server::AppState;
use crate::error::Result;
use crate::services::users::ProfileInput;

pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Vec<UserDto>>> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(UserDto::from).collect()))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<UserDto>> {
    Ok(Json(state.users.get(id).await?.into()))
}

pub async fn get_by_username(
    State(state): State<Arc<AppState>>,
    ApiPath(username): ApiPath<String>,
) -> Result<Json<UserDto>> {
    Ok(Json(state.users.get_by_username(&username).await?.into()))
}

pub async fn update_me(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ValidatedJson(payload): ValidatedJson<ProfileInput>,
) -> Result<Json<UserDto>> {
    Ok(Json(state.users.update_profile(&user, payload).await?.into()))
}
