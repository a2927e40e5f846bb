//! Filename handling for the upload wire format.
//!
//! The server expects the original filename as a query parameter, encoded as
//! base64url over the form-urlencoded name (space becomes `+`). Decoding on
//! the server side is the exact inverse, so the escaping must match
//! form-urlencoding rather than path-style percent escaping.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;

/// Encode a filename for the `?filename=` upload query parameter.
pub fn encode_filename(name: &str) -> String {
    let escaped: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
    URL_SAFE.encode(escaped)
}

/// Map a filename extension to the Content-Type the server accepts.
///
/// Mirrors the server's allowlist; anything else uploads as a generic
/// octet-stream and is rejected there with an invalid-filename error.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "avi" => "video/avi",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}
