use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::{NewUser, UserResponse};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(custom(
        function = "crate::router::validate_not_blank",
        message = "Name is required."
    ))]
    pub name: String,
    #[validate(custom(
        function = "crate::router::validate_not_blank",
        message = "Lastname is required."
    ))]
    pub lastname: String,
    #[serde(deserialize_with = "crate::user::birthdate::deserialize")]
    pub birthdate: NaiveDate,
    #[serde(default, deserialize_with = "crate::router::blank_as_none")]
    pub role: Option<String>,
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(
        min = 6,
        message = "Password must contain at least 6 characters."
    ))]
    pub password: String,
    #[serde(default, deserialize_with = "crate::router::blank_as_none")]
    #[validate(url(message = "Avatar must be a URL."))]
    pub avatar: Option<String>,
}

impl From<Body> for NewUser {
    fn from(body: Body) -> Self {
        NewUser {
            name: body.name,
            lastname: body.lastname,
            birthdate: body.birthdate,
            role: body.role,
            email: body.email,
            password: body.password,
            avatar: body.avatar,
        }
    }
}

/// Handler to create user.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let user = state.users.create(body.into()).await?;

    Ok((StatusCode::CREATED, Json(user)))
}
