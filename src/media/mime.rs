use std::path::Path;

/// Served when the extension is not in [`MIME_TABLE`].
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Extension → MIME type for the formats cast receivers play.
/// Keys are lowercase; lookups are case-insensitive.
const MIME_TABLE: &[(&str, &str)] = &[
    // Video
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("mkv", "video/x-matroska"),
    ("webm", "video/webm"),
    ("mov", "video/quicktime"),
    ("avi", "video/x-msvideo"),
    ("ts", "video/MP2T"),
    ("m2ts", "video/MP2T"),
    ("mpg", "video/mpeg"),
    ("mpeg", "video/mpeg"),
    ("ogv", "video/ogg"),
    // Audio
    ("mp3", "audio/mpeg"),
    ("flac", "audio/flac"),
    ("wav", "audio/wav"),
    ("m4a", "audio/mp4"),
    ("aac", "audio/aac"),
    ("ogg", "audio/ogg"),
    ("oga", "audio/ogg"),
    ("opus", "audio/ogg"),
    // Image
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
    // Captions and plain text
    ("vtt", "text/vtt"),
    ("srt", "text/srt"),
    ("txt", "text/plain"),
];

/// MIME type for `path` by extension, or `None` for unknown extensions.
pub fn lookup(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    MIME_TABLE
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

/// MIME type used for the `Content-Type` header when serving `path`.
pub fn mime_for(path: &Path) -> &'static str {
    lookup(path).unwrap_or(FALLBACK_MIME)
}
