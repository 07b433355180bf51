//! Error responses for the read API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use unionlink_core::error::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The link store could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Store(err) => {
                tracing::error!(error = %err, "link store query failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
            }
        }
    }
}
