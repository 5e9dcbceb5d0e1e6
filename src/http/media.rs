use std::path::PathBuf;
use std::sync::PoisonError;

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use http_range_header::parse_range_header;
use serde::Deserialize;

use crate::http::error::ApiError;
use crate::http::state::MediaState;
use crate::http::{present, required};
use crate::media::catalog::{MediaCatalog, MediaItem};
use crate::media::chunks::ChunkStream;
use crate::media::mime;

#[derive(Debug, Deserialize)]
pub struct LoadParams {
    pub target: Option<String>,
}

/// GET /load: catalog `target` and make it the served set.
/// A failed load leaves the previous catalog in place.
pub async fn load(
    State(state): State<MediaState>,
    Query(params): Query<LoadParams>,
) -> Result<&'static str, ApiError> {
    let target = required(params.target, "target")?;
    // Only local paths can be cataloged; receivers fetch remote URLs themselves.
    if target.contains("://") {
        return Err(ApiError::RemoteTarget(target));
    }

    let root = PathBuf::from(&target);
    let links = state.links.clone();
    // Directory walks block; keep them off the async workers.
    let catalog = tokio::task::spawn_blocking(move || MediaCatalog::load(&root, &links))
        .await
        .map_err(|e| ApiError::Internal(format!("catalog task failed: {e}")))??;

    tracing::info!("loaded {} assets in {}", catalog.len(), target);
    // Swap the whole catalog in one write; readers see the old set or the new one.
    *state
        .catalog
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Some(catalog);
    Ok("Loaded assets.")
}

#[derive(Debug, Deserialize)]
pub struct ServeParams {
    pub media_file: Option<String>,
}

/// Resolve `media_file` against the current catalog.
/// The read lock is released before returning, so this is safe ahead of any `.await`.
fn lookup_item(state: &MediaState, media_file: Option<String>) -> Result<MediaItem, ApiError> {
    let guard = state.catalog.read().unwrap_or_else(PoisonError::into_inner);
    let catalog = guard.as_ref().ok_or(ApiError::NotLoaded)?;
    let needle = required(media_file, "media_file")?;
    Ok(catalog.resolve(&needle)?.clone())
}

/// Response headers present on every media response (GET + HEAD).
fn media_headers(item: &MediaItem, size: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(mime::mime_for(&item.filename)),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    // Receivers seek by issuing Range requests.
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers
}

async fn file_size(item: &MediaItem) -> Result<u64, Response> {
    match tokio::fs::metadata(&item.filename).await {
        Ok(meta) => Ok(meta.len()),
        Err(e) => {
            tracing::error!("Failed to stat {}: {}", item.filename.display(), e);
            Err(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

/// HEAD /: headers only; the file is never opened.
pub async fn serve_media_head(
    State(state): State<MediaState>,
    Query(params): Query<ServeParams>,
) -> Response {
    let item = match lookup_item(&state, params.media_file) {
        Ok(item) => item,
        Err(e) => return e.into_response(),
    };
    let size = match file_size(&item).await {
        Ok(size) => size,
        Err(resp) => return resp,
    };
    // Headers only; the file itself stays closed.
    (StatusCode::OK, media_headers(&item, size)).into_response()
}

/// GET /: stream the single matching file, honouring a `Range` header.
pub async fn serve_media_get(
    State(state): State<MediaState>,
    Query(params): Query<ServeParams>,
    req_headers: HeaderMap,
) -> Response {
    // Lookup clones the item so the catalog lock is gone before any .await
    let item = match lookup_item(&state, params.media_file) {
        Ok(item) => item,
        Err(e) => return e.into_response(),
    };
    let size = match file_size(&item).await {
        Ok(size) => size,
        Err(resp) => return resp,
    };
    let headers = media_headers(&item, size);

    if let Some(range_val) = req_headers.get(header::RANGE) {
        return match range_val.to_str() {
            Ok(range_str) => range_response(&item, size, range_str, headers),
            // Non-ASCII Range value
            Err(_) => unsatisfiable(size),
        };
    }

    // Full GET. A stream error mid-body aborts the transfer.
    tracing::info!("served file: {}", item.filename.display());
    let body = Body::from_stream(ChunkStream::spawn(vec![item.filename]));
    (StatusCode::OK, headers, body).into_response()
}

fn unsatisfiable(size: u64) -> Response {
    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [(header::CONTENT_RANGE, format!("bytes */{size}"))],
    )
        .into_response()
}

/// 206 for the first satisfiable range, 416 otherwise.
fn range_response(item: &MediaItem, size: u64, range_str: &str, mut headers: HeaderMap) -> Response {
    let Ok(parsed) = parse_range_header(range_str) else {
        return unsatisfiable(size);
    };
    let Ok(ranges) = parsed.validate(size) else {
        return unsatisfiable(size);
    };
    let Some(first) = ranges.into_iter().next() else {
        return unsatisfiable(size);
    };

    // Multi-range requests get the first range only
    let start = *first.start();
    let end = *first.end(); // inclusive
    let length = end - start + 1;

    if let Ok(value) = HeaderValue::from_str(&format!("bytes {start}-{end}/{size}")) {
        headers.insert(header::CONTENT_RANGE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));

    tracing::debug!("served bytes {}-{} of {}", start, end, item.filename.display());
    let body = Body::from_stream(ChunkStream::range(item.filename.clone(), start, length));
    (StatusCode::PARTIAL_CONTENT, headers, body).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ContentParams {
    pub id: Option<String>,
}

fn content_response(state: &MediaState, id: Option<String>) -> Result<Response, ApiError> {
    let guard = state.catalog.read().unwrap_or_else(PoisonError::into_inner);
    let catalog = guard.as_ref().ok_or(ApiError::NotLoaded)?;

    let Some(raw) = present(id) else {
        return Ok((
            [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
            catalog.listing(),
        )
            .into_response());
    };
    let id: usize = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
        ApiError::InvalidParam {
            name: "id",
            reason: e.to_string(),
        }
    })?;
    let item = catalog.get(id).ok_or(ApiError::OutOfRange(id))?;
    tracing::info!("sent details for {}", item.filename.display());
    Ok(Json(item.clone()).into_response())
}

/// GET /content: CSV listing of the catalog, or one item's descriptor by `id`.
pub async fn content(
    State(state): State<MediaState>,
    Query(params): Query<ContentParams>,
) -> Response {
    match content_response(&state, params.id) {
        Ok(resp) => resp,
        Err(e) => e.into_response(),
    }
}
