//! Error handler for users-api.

use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::crypto::CryptoError;

pub type Result<T> = std::result::Result<T, ServerError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("user not found")]
    NotFound,

    #[error("email is already used by another account")]
    Conflict,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("store request failed: {0}")]
    Store(BoxError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("invalid 'Authorization' header")]
    Unauthorized,

    #[error("no route matches the request")]
    UnknownRoute,
}

impl From<sqlx::Error> for ServerError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ServerError::NotFound,
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                ServerError::Conflict
            },
            err => ServerError::Store(Box::new(err)),
        }
    }
}

/// Wrap any store-level failure into [`ServerError::Store`].
pub trait ToStoreError<T> {
    fn catch(self) -> Result<T>;
}

impl<T, E> ToStoreError<T> for std::result::Result<T, E>
where
    E: Into<ServerError>,
{
    fn catch(self) -> Result<T> {
        self.map_err(Into::into)
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    r#type: Option<String>,
    title: String,
    status: u16,
    detail: String,
    instance: Option<String>,
    errors: Option<Vec<FieldError>>,
}

impl ResponseError {
    /// Update error status code.
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code.as_u16();
        self
    }

    /// Update `title` field.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }

    /// Add detailed error.
    pub fn details(mut self, description: &str) -> Self {
        self.detail = description.into();
        self
    }

    /// Automatically add errors field.
    pub fn errors(mut self, errors: &ValidationErrors) -> Self {
        self.errors = Some(parse_validation_errors(errors));
        self
    }

    /// Transform [`ResponseError`] into axum [`Response`].
    pub fn into_response(
        self,
    ) -> std::result::Result<Response, axum::http::Error> {
        if let Ok(body) = serde_json::to_string(&self) {
            Response::builder()
                .status(self.status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(body.into())
        } else {
            Ok(internal_server_error())
        }
    }
}

impl Default for ResponseError {
    fn default() -> Self {
        Self {
            r#type: None,
            title: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            detail: String::default(),
            instance: None,
            errors: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| issue.code.to_string()),
            })
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let response = ResponseError::default()
            .title("There were validation errors with your request.")
            .details(&self.to_string())
            .status(StatusCode::BAD_REQUEST);

        let response = match &self {
            ServerError::Validation(validation_errors) => {
                response.errors(validation_errors)
            },

            ServerError::Axum(rejection) => response
                .title("Request body is malformed.")
                .details(&rejection.body_text())
                .status(match rejection {
                    JsonRejection::JsonDataError(_)
                    | JsonRejection::MissingJsonContentType(_) => {
                        StatusCode::BAD_REQUEST
                    },
                    other => other.status(),
                }),

            ServerError::InvalidFilter(_) => {
                response.title("Listing filter is not supported.")
            },

            ServerError::NotFound => response
                .title("User not found.")
                .status(StatusCode::NOT_FOUND),

            ServerError::Conflict => response
                .title("Email already exists.")
                .status(StatusCode::CONFLICT),

            ServerError::InvalidCredentials => response
                .title("Invalid credentials.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::Unauthorized => response
                .title("Missing or invalid 'Authorization' header.")
                .status(StatusCode::UNAUTHORIZED),

            ServerError::UnknownRoute => response
                .title("Not found.")
                .status(StatusCode::NOT_FOUND),

            ServerError::Store(err) => {
                tracing::error!(error = %err, "store request failed");
                ResponseError::default()
            },

            ServerError::Crypto(err) => {
                tracing::error!(error = %err, "password hashing failed");
                ResponseError::default()
            },
        };

        response
            .into_response()
            .unwrap_or_else(|_| internal_server_error())
    }
}

fn internal_server_error() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(
            serde_json::json!({
                "type": null,
                "title": "Internal server error.",
                "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "detail": null,
                "instance": null,
                "errors": null,
            })
            .to_string()
            .into(),
        )
        .unwrap_or_else(|_| Response::new("Internal server error".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServerError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::UnknownRoute.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::Conflict.into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServerError::InvalidCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServerError::InvalidFilter("age".into())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_store_error_is_not_leaked() {
        let err = ServerError::Store("connection reset by peer".into());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_sqlx_row_not_found() {
        assert!(matches!(
            ServerError::from(sqlx::Error::RowNotFound),
            ServerError::NotFound
        ));
        assert!(matches!(
            ServerError::from(sqlx::Error::PoolTimedOut),
            ServerError::Store(_)
        ));
    }
}
