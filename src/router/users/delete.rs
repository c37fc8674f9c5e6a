//! Soft-delete a user.

use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::AppState;
use crate::error::Result;

pub async fn handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode> {
    state.users.delete(&user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
pub(super) mod tests {
    use axum::http::StatusCode;

    use crate::user::NewUser;
    use crate::*;

    #[tokio::test]
    async fn test_delete_twice() {
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
        let app = app(state);

        let path = format!("/users/{}", user.id);
        let response =
            make_request(app.clone(), Method::DELETE, &path, String::default())
                .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response =
            make_request(app, Method::DELETE, &path, String::default()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
