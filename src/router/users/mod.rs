//! Users-related HTTP API.
mod create;
mod delete;
mod get;
mod list;
mod login;
mod update;

use axum::Router;
use axum::routing::{get, post};

use crate::AppState;

/// Routes under `/users`. Paths are absolute so `/users` and `/users/` both
/// resolve; static segments win over `{user_id}`.
pub fn router() -> Router<AppState> {
    Router::new()
        // `GET /users` lists, `POST /users` creates.
        .route("/users", get(list::all).post(create::handler))
        .route("/users/", get(list::all).post(create::handler))
        // `GET /users/list` is the all-or-nothing bulk lookup.
        .route("/users/list", get(list::many))
        .route("/users/login", post(login::handler))
        .route("/users/email/{email}", get(get::by_email))
        .route(
            "/users/{user_id}",
            get(get::by_id).put(update::handler).delete(delete::handler),
        )
}
