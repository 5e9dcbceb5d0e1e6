mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use pusher::http::{build_media_router, state::MediaState};

use common::links;

const A_BYTES: &[u8] = b"alpha file contents\n";
const B_BYTES: &[u8] = b"bravo file, a bit longer than the first one\n";

fn fixture() -> (tempfile::TempDir, Router) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a_ascii.txt"), A_BYTES).unwrap();
    std::fs::write(dir.path().join("b_ascii.txt"), B_BYTES).unwrap();
    (dir, build_media_router(MediaState::new(links())))
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

async fn request(app: &Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body.to_vec())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    request(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn load_fixture(app: &Router, dir: &tempfile::TempDir) {
    let uri = format!("/load?target={}", encode(&dir.path().to_string_lossy()));
    let (status, _, body) = get(app, &uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"Loaded assets.");
}

#[tokio::test]
async fn test_nothing_served_before_load() {
    let (_dir, app) = fixture();
    let (status, _, body) = get(&app, "/?media_file=a_ascii").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"no media loaded\n");

    let (status, _, body) = get(&app, "/content").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"no media loaded\n");
}

#[tokio::test]
async fn test_load_rejections() {
    let (dir, app) = fixture();

    let (status, _, body) = get(&app, "/load").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"missing 'target' in query parameter\n");

    let (status, _, body) = get(&app, "/load?target=http%3A%2F%2Fexample.com%2Fa.mp4").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(String::from_utf8(body).unwrap().starts_with("Remote URL not supported"));

    let missing = dir.path().join("nope");
    let (status, _, _) = get(&app, &format!("/load?target={}", encode(&missing.to_string_lossy()))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_failed_load_keeps_previous_catalog() {
    let (dir, app) = fixture();
    load_fixture(&app, &dir).await;

    let missing = dir.path().join("nope");
    get(&app, &format!("/load?target={}", encode(&missing.to_string_lossy()))).await;

    let (status, _, body) = get(&app, "/?media_file=a_ascii").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, A_BYTES);
}

#[tokio::test]
async fn test_serves_exact_bytes() {
    let (dir, app) = fixture();
    load_fixture(&app, &dir).await;

    let (status, headers, body) = get(&app, "/?media_file=b_ascii").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, B_BYTES);
    assert_eq!(headers[header::CONTENT_LENGTH], B_BYTES.len().to_string().as_str());
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
}

#[tokio::test]
async fn test_ambiguous_match_lists_candidates() {
    let (dir, app) = fixture();
    load_fixture(&app, &dir).await;

    let (status, headers, body) = get(&app, "/?media_file=ascii").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "'ascii' matches multiple loaded; try again");
    let candidates = json["candidates"].as_array().unwrap();
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0]["id"], 0);
    assert_eq!(candidates[1]["id"], 1);
    assert!(candidates[1]["url"].as_str().unwrap().contains("b_ascii.txt"));
}

#[tokio::test]
async fn test_unknown_and_missing_media_file() {
    let (dir, app) = fixture();
    load_fixture(&app, &dir).await;

    let (status, _, body) = get(&app, "/?media_file=charlie").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"charlie not found in loaded media\n");

    let (status, _, body) = get(&app, "/").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"missing 'media_file' in query parameter\n");
}

#[tokio::test]
async fn test_range_request() {
    let (dir, app) = fixture();
    load_fixture(&app, &dir).await;

    let req = Request::builder()
        .uri("/?media_file=a_ascii")
        .header(header::RANGE, "bytes=6-9")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = request(&app, req).await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    assert_eq!(body, &A_BYTES[6..10]);
    assert_eq!(
        headers[header::CONTENT_RANGE],
        format!("bytes 6-9/{}", A_BYTES.len()).as_str()
    );

    let req = Request::builder()
        .uri("/?media_file=a_ascii")
        .header(header::RANGE, "bytes=5000-6000")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = request(&app, req).await;
    assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(
        headers[header::CONTENT_RANGE],
        format!("bytes */{}", A_BYTES.len()).as_str()
    );
}

#[tokio::test]
async fn test_head_has_headers_only() {
    let (dir, app) = fixture();
    load_fixture(&app, &dir).await;

    let req = Request::builder()
        .method("HEAD")
        .uri("/?media_file=a_ascii")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = request(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
    assert_eq!(headers[header::CONTENT_LENGTH], A_BYTES.len().to_string().as_str());
}

#[tokio::test]
async fn test_content_listing_and_details() {
    let (dir, app) = fixture();
    load_fixture(&app, &dir).await;

    let (status, headers, body) = get(&app, "/content").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    let listing = String::from_utf8(body).unwrap();
    let lines: Vec<_> = listing.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "id,url");
    assert!(lines[1].starts_with("0,http://127.0.0.1:9002/?media_file="));
    assert!(lines[2].contains("b_ascii.txt"));

    let (status, _, body) = get(&app, "/content?id=1").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["filename"].as_str().unwrap().ends_with("b_ascii.txt"));
    assert_eq!(json["contentType"], ".txt");
    assert_eq!(json["transcode"], false);
    assert!(json["contentURL"].as_str().unwrap().ends_with("&live_streaming=false"));

    let (status, _, body) = get(&app, "/content?id=2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, b"'2' is outside of list index\n");

    let (status, _, _) = get(&app, "/content?id=first").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
