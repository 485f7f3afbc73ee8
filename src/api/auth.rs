use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::{AuthResponse, UserDto};
use crate::api::extract::{AuthUser, ValidatedJson};
use crate::api::server::AppState;
use crate::error::Result;
use crate::services::auth::{AuthSession, LoginInput, RegisterInput};

fn auth_response(state: &AppState, session: AuthSession) -> AuthResponse {
    AuthResponse {
        token: session.token,
        token_type: "Bearer",
        expires_in: state.auth.token_ttl_secs(),
        user: session.user.into(),
    }
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<RegisterInput>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let session = state.auth.register(payload).await?;
    Ok((StatusCode::CREATED, Json(auth_response(&state, session))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<LoginInput>,
) -> Result<Json<AuthResponse>> {
    let session = state.auth.login(payload).await?;
    tracing::info!(user_id = session.user.id, "user logged in");
    Ok(Json(auth_response(&state, session)))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserDto> {
    Json(user.into())
}
