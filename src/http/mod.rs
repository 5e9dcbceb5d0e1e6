pub mod control;
pub mod error;
pub mod media;
pub mod state;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::http::error::ApiError;
use crate::http::state::{ControlState, MediaState};

/// Device discovery and session control. Request method is not significant
/// beyond convention, so mutating routes accept GET as well as POST.
pub fn build_control_router(state: ControlState) -> Router {
    Router::new()
        .route("/devices", get(control::devices))
        .route("/connect", get(control::connect).post(control::connect))
        .route("/disconnect", get(control::disconnect).post(control::disconnect))
        .route("/load", get(control::load).post(control::load))
        .route("/connected", get(control::connected))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Media catalog and byte serving, polled by receivers.
pub fn build_media_router(state: MediaState) -> Router {
    Router::new()
        .route("/", get(media::serve_media_get).head(media::serve_media_head))
        .route("/load", get(media::load))
        .route("/content", get(media::content))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Query value, with blank strings treated as absent.
pub(crate) fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub(crate) fn required(value: Option<String>, name: &'static str) -> Result<String, ApiError> {
    present(value).ok_or(ApiError::MissingParam(name))
}
