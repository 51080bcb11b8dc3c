/// Image shown when a record has no media.
pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/150";

/// Resolve a media path returned by the API to a fetchable URL.
///
/// Absolute `http(s)://` URLs are kept, relative paths are joined to
/// `media_base`, and a missing or blank path gives [`PLACEHOLDER_IMAGE`].
pub fn media_url(media_base: &str, path: Option<&str>) -> String {
    let Some(path) = path.map(str::trim).filter(|p| !p.is_empty()) else {
        return PLACEHOLDER_IMAGE.to_string();
    };
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        media_base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
