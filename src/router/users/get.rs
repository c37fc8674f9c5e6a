//! Single-user lookups.

use axum::Json;
use axum::extract::{Path, State};

use crate::AppState;
use crate::error::Result;
use crate::user::UserResponse;

pub async fn by_id(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>> {
    Ok(Json(state.users.get_by_id(&user_id).await?))
}

pub async fn by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<UserResponse>> {
    Ok(Json(state.users.get_by_email(&email).await?))
}
