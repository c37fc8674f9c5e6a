//! Partial update of a user.

use axum::Json;
use axum::extract::{Path, State};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::{UserResponse, UserUpdate};

/// Every field is optional. Blank strings count as absent.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct Body {
    #[serde(default, deserialize_with = "crate::router::blank_as_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::router::blank_as_none")]
    pub lastname: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::user::birthdate::option::deserialize"
    )]
    pub birthdate: Option<NaiveDate>,
    #[serde(default, deserialize_with = "crate::router::blank_as_none")]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "crate::router::blank_as_none")]
    #[validate(email(message = "Email must be formatted."))]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "crate::router::blank_as_none")]
    #[validate(length(
        min = 6,
        message = "Password must contain at least 6 characters."
    ))]
    pub password: Option<String>,
    #[serde(default, deserialize_with = "crate::router::blank_as_none")]
    #[validate(url(message = "Avatar must be a URL."))]
    pub avatar: Option<String>,
}

pub async fn handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Valid(body): Valid<Body>,
) -> Result<Json<UserResponse>> {
    let update = UserUpdate {
        name: body.name,
        lastname: body.lastname,
        birthdate: body.birthdate,
        role: body.role,
        email: body.email,
        password: body.password,
        avatar: body.avatar,
    };

    Ok(Json(state.users.update(&user_id, update).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use serde_json::json;

    use crate::user::{NewUser, UserResponse};
    use crate::*;

    async fn seeded() -> (AppState, UserResponse) {
        let state = test_state();
        let user = state
            .users
            .create(NewUser {
                name: "Ana".into(),
                lastname: "Diaz".into(),
                email: "ana@x.com".into(),
                password: "secret1".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        (state, user)
    }

    #[tokio::test]
    async fn test_update_handler() {
        let (state, user) = seeded().await;
        let app = app(state.clone());

        // Warm the cache so the update has something to invalidate.
        state.users.get_by_id(&user.id).await.unwrap();

        let path = format!("/users/{}", user.id);
        let response = make_request(
            app,
            Method::PUT,
            &path,
            json!({ "name": "", "birthdate": "2001-02-03", "password": "secret2" })
                .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: UserResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.name, "Ana");
        assert_eq!(body.birthdate.to_string(), "2001-02-03");
        assert_eq!(state.users.get_by_id(&user.id).await.unwrap(), body);
        assert!(state.users.login("ana@x.com", "secret2").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_with_invalid_fields() {
        let (state, user) = seeded().await;
        let app = app(state);

        let path = format!("/users/{}", user.id);
        for body in [json!({ "email": "nope" }), json!({ "password": "short" })] {
            let response =
                make_request(app.clone(), Method::PUT, &path, body.to_string())
                    .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }

        let response = make_request(
            app,
            Method::PUT,
            "/users/unknown",
            json!({ "role": "admin" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
