//! Request Extractors
//!
//! `Json` and `Path` wrappers whose rejections use the `{error, code}`
//! body every other failure uses.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Path, Request,
    },
    http::{request::Parts, StatusCode},
    Json,
};

use crate::error::{error_response, ApiError};

/// JSON request body
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(status = rejection.status().as_u16(), error = %rejection.body_text(), "Rejected request body");
                Err(error_response(
                    StatusCode::BAD_REQUEST,
                    rejection.body_text(),
                    "VALIDATION_ERROR",
                ))
            }
        }
    }
}

/// Typed path parameters
pub struct ApiPath<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => {
                let status = rejection.status();
                // A missing route parameter is a routing bug, not bad input.
                let status = if status.is_server_error() {
                    status
                } else {
                    StatusCode::BAD_REQUEST
                };
                Err(error_response(status, rejection.body_text(), "VALIDATION_ERROR"))
            }
        }
    }
}
