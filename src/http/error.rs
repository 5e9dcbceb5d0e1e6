use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::discovery::DiscoveryError;
use crate::media::catalog::{CatalogError, MatchError};
use crate::session::SessionError;

/// Every request-scope failure, mapped onto an HTTP response in one place.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing '{0}' in query parameter")]
    MissingParam(&'static str),
    #[error("invalid '{name}': {reason}")]
    InvalidParam { name: &'static str, reason: String },
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("no media loaded")]
    NotLoaded,
    #[error("Remote URL not supported: {0}")]
    RemoteTarget(String),
    #[error("'{0}' is outside of list index")]
    OutOfRange(usize),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Session(SessionError::Connection(_) | SessionError::Load(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Session(SessionError::Discovery(_)) | ApiError::Discovery(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        tracing::warn!("{}: {}", status.as_u16(), message);

        match self {
            // Ambiguous matches carry the candidates so the caller can pick one.
            ApiError::Match(MatchError::Ambiguous { candidates, .. }) => (
                status,
                Json(serde_json::json!({
                    "error": message,
                    "candidates": candidates,
                })),
            )
                .into_response(),
            _ => (
                status,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("{message}\n"),
            )
                .into_response(),
        }
    }
}
