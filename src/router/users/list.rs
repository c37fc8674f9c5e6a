//! Listings.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::{Result, ServerError};
use crate::router::Valid;
use crate::user::{UserFilter, UserResponse};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    pub ids: Vec<String>,
}

/// List live users. An optional JSON object body filters on field equality,
/// e.g. `{"role": "admin"}`.
pub async fn all(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Vec<UserResponse>>> {
    let filter = if body.iter().all(u8::is_ascii_whitespace) {
        UserFilter::all()
    } else {
        let map: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(&body).map_err(|_| {
                ServerError::InvalidFilter("body must be a JSON object".into())
            })?;
        UserFilter::try_from(map)?
    };

    Ok(Json(state.users.get_all(&filter).await?))
}

/// Every user in `ids`, or 404 if any is missing.
pub async fn many(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Vec<UserResponse>>> {
    Ok(Json(state.users.get_many(&body.ids).await?))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use serde_json::json;

    use super::*;
    use crate::user::NewUser;
    use crate::*;

    async fn seeded() -> (AppState, Vec<UserResponse>) {
        let state = test_state();
        let mut users = Vec::new();
        for (email, role) in [("a@x.com", None), ("b@x.com", Some("admin"))] {
            users.push(
                state
                    .users
                    .create(NewUser {
                        name: "Ana".into(),
                        lastname: "Diaz".into(),
                        email: email.into(),
                        password: "secret1".into(),
                        role: role.map(Into::into),
                        ..Default::default()
                    })
                    .await
                    .unwrap(),
            );
        }
        (state, users)
    }

    async fn users(
        response: axum::http::Response<axum::body::Body>,
    ) -> Vec<UserResponse> {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_list_all() {
        let (state, created) = seeded().await;
        let app = app(state);

        let response =
            make_request(app.clone(), Method::GET, "/users", String::default())
                .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(users(response).await.len(), created.len());

        let response = make_request(
            app.clone(),
            Method::GET,
            "/users/",
            json!({ "role": "admin" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(users(response).await, vec![created[1].clone()]);

        let response = make_request(
            app,
            Method::GET,
            "/users/",
            json!({ "password": "x" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_many() {
        let (state, created) = seeded().await;
        let app = app(state);

        let ids = vec![created[0].id.clone(), created[1].id.clone()];
        let response = make_request(
            app.clone(),
            Method::GET,
            "/users/list",
            json!({ "ids": ids }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(users(response).await, created);

        let response = make_request(
            app,
            Method::GET,
            "/users/list",
            json!({ "ids": [ids[0], ids[1], "c"] }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
