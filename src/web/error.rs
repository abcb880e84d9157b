use axum::{
    extract::multipart::MultipartError,
    http::{header::InvalidHeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum WebError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::MalformedPayload(reason) => {
                warn!("Rejected request: {reason}");
                (StatusCode::BAD_REQUEST, "Malformed payload").into_response()
            }
            WebError::Multipart(err) => {
                warn!("Rejected multipart body: {err}");
                (err.status(), err.body_text()).into_response()
            }
            other => {
                error!("{other}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}
