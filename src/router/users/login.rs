use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::UserResponse;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(email(message = "Email must be formatted."))]
    email: String,
    #[validate(custom(
        function = "crate::router::validate_not_blank",
        message = "Password is required."
    ))]
    password: String,
}

/// Handler to check credentials. Returns the matching user.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<UserResponse>> {
    Ok(Json(state.users.login(&body.email, &body.password).await?))
}
