use crate::error::AppError;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::error;
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

pub mod assistants;
pub mod categories;
pub mod chat;
pub mod faqs;

const X_USER_ID: &str = "X-User-ID";

/// All endpoints; the caller attaches the DI provider.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/faqs", faqs::router())
        .nest("/categories", categories::router())
        .nest("/assistants", assistants::router())
        .nest("/chat", chat::router())
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Debug)]
pub struct ExtractUser(pub Uuid);

fn bad_request(message: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_owned(),
        }),
    )
}

#[async_trait]
impl<S> FromRequestParts<S> for ExtractUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorBody>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(user_id) = parts.headers.get(X_USER_ID) else {
            return Err(bad_request("`X-User-ID` header is missing"));
        };
        let user_id = user_id
            .to_str()
            .ok()
            .and_then(|id| Uuid::from_str(id).ok())
            .ok_or_else(|| bad_request("invalid user id"))?;
        Ok(ExtractUser(user_id))
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Conflict(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::Upstream(_) => {
                error!("{self}");
                (
                    StatusCode::BAD_GATEWAY,
                    "the completion service is unavailable".to_owned(),
                )
            }
            AppError::Persistence(_) | AppError::Prompt(_) => {
                error!("{self}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
