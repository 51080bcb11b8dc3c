//! Networking: the shared reqwest client, per-request headers, rebuildable
//! requests and the token-refreshing API client.

pub mod api_client;
pub mod client;
pub mod headers;
pub mod refresh;
pub mod request;

pub use api_client::ApiClient;
pub use client::{HttpClient, HttpClientBuilder};
pub use refresh::RefreshCoordinator;
pub use request::{ApiRequest, Attachment, MultipartBody, RequestBody};

/// Join a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
