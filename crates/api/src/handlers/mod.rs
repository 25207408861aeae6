pub mod audio;
pub mod costs;
pub mod jobs;

use axum::http::HeaderMap;
use lipsync_core::job::ApiKey;

/// Header carrying the caller's API key when the body omits it.
pub const API_KEY_HEADER: &str = "x-api-key";

/// `key` if present, else the `x-api-key` header.
pub(crate) fn key_or_header(key: ApiKey, headers: &HeaderMap) -> ApiKey {
    if !key.is_empty() {
        return key;
    }
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ApiKey::new)
        .unwrap_or(key)
}
