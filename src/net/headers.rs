//! Outgoing request headers.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrftoken");
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// `Bearer <token>`, without doubling a prefix the token already carries.
pub fn bearer_value(token: &str) -> String {
    let token = token.trim();
    if token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}

/// Find `name` in a `Cookie` header value (`a=1; b=2`).
pub fn cookie_value(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

/// Build the per-request header set: authorization, anti-forgery token and a
/// fresh request id.
pub fn request_headers(access: Option<&str>, csrf: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Some(token) = access.filter(|t| !t.trim().is_empty()) {
        match HeaderValue::from_str(&bearer_value(token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(e) => warn!(error = %e, "Access token is not a valid header value"),
        }
    }

    if let Some(csrf) = csrf {
        if let Ok(value) = HeaderValue::from_str(csrf) {
            headers.insert(CSRF_HEADER, value);
        }
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(REQUEST_ID_HEADER, value);
    }

    debug!(
        %request_id,
        authorization = headers.contains_key(AUTHORIZATION),
        csrf = headers.contains_key(CSRF_HEADER),
        "Attached request headers"
    );
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_not_doubled() {
        assert_eq!(bearer_value("abc"), "Bearer abc");
        assert_eq!(bearer_value("Bearer abc"), "Bearer abc");
    }

    #[test]
    fn test_cookie_value() {
        let header = "sessionid=s1; csrftoken=tok; theme=dark";
        assert_eq!(cookie_value(header, "csrftoken").as_deref(), Some("tok"));
        assert!(cookie_value(header, "missing").is_none());
        assert!(cookie_value("csrftoken=", "csrftoken").is_none());
    }

    #[test]
    fn test_request_headers() {
        let headers = request_headers(Some("Bearer t"), Some("c"));
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer t");
        assert_eq!(headers.get(CSRF_HEADER).unwrap(), "c");
        assert!(headers.contains_key(REQUEST_ID_HEADER));

        let anonymous = request_headers(None, None);
        assert!(!anonymous.contains_key(AUTHORIZATION));
        assert!(!anonymous.contains_key(CSRF_HEADER));
        assert!(anonymous.contains_key(REQUEST_ID_HEADER));
    }

    #[test]
    fn test_request_ids_differ() {
        let a = request_headers(None, None);
        let b = request_headers(None, None);
        assert_ne!(a.get(REQUEST_ID_HEADER), b.get(REQUEST_ID_HEADER));
    }
}
