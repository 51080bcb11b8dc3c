//! Authenticated API client.
//!
//! Attaches authorization, anti-forgery and request-id headers to every call,
//! and recovers from a 401 by refreshing the access token and resubmitting the
//! request once.

use std::sync::Arc;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument, warn};

use crate::auth::AuthManager;
use crate::error::{Error, Result, detail_from_body};
use crate::net::refresh::RefreshCoordinator;
use crate::net::request::{ApiRequest, RequestBody};
use crate::net::{HttpClient, headers, join_url};

/// HTTP client bound to one [`AuthManager`].
///
/// Cheap to clone; clones share the refresh coordinator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: HttpClient,
    base_url: String,
    auth: AuthManager,
    refresh: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(http: HttpClient, base_url: impl Into<String>, auth: AuthManager) -> Self {
        Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.into(),
                auth,
                refresh: RefreshCoordinator::new(),
            }),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn auth(&self) -> &AuthManager {
        &self.inner.auth
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    /// Send a request and decode a JSON response.
    pub async fn json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }

    /// Send a request and discard the response body.
    pub async fn execute(&self, request: &ApiRequest) -> Result<()> {
        self.send(request).await.map(|_| ())
    }

    /// Send a request, returning the successful response.
    ///
    /// A 401 triggers one refresh-and-resubmit. A 401 on the resubmitted
    /// request is [`Error::Unauthorized`]. Other failures are classified and
    /// returned without retry.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: &ApiRequest) -> Result<Response> {
        let mut token = self.inner.auth.access_token();
        let mut retried = false;

        loop {
            let response = self.dispatch(request, token.as_deref()).await?;
            let status = response.status();

            if status.is_success() {
                return Ok(response);
            }

            if status == StatusCode::UNAUTHORIZED && !retried {
                retried = true;
                debug!("401 received, refreshing access token");
                token = Some(self.refreshed_token(token.as_deref()).await?);
                continue;
            }

            return Err(classify(request, response).await);
        }
    }

    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response> {
        let url = join_url(&self.inner.base_url, &request.path);
        let csrf = self.inner.http.csrf_token(&url);

        let mut builder = self
            .inner
            .http
            .inner()
            .request(request.method.clone(), &url)
            .headers(headers::request_headers(token, csrf.as_deref()));

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(body) => builder.multipart(body.to_form()?),
        };

        Ok(builder.send().await?)
    }

    /// Token to resubmit with, from the coordinator. Only the refresh leader
    /// publishes the sign-in event on failure, and only when signed out.
    async fn refreshed_token(&self, stale: Option<&str>) -> Result<String> {
        let auth = &self.inner.auth;
        self.inner
            .refresh
            .obtain(
                stale,
                || auth.access_token(),
                || async {
                    let outcome = auth.refresh_access_token().await;
                    // A login that landed mid-refresh keeps its session.
                    if outcome.is_err() && !auth.is_authenticated() {
                        auth.require_sign_in();
                    }
                    outcome
                },
            )
            .await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .field("refresh", &self.inner.refresh)
            .finish()
    }
}

/// Turn a failed response into an [`Error`], logging it by status class.
async fn classify(request: &ApiRequest, response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = detail_from_body(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    });

    match status.as_u16() {
        401 => warn!(path = %request.path, "Unauthorized after token refresh"),
        403 => warn!(path = %request.path, %message, "Forbidden"),
        404 => warn!(path = %request.path, "Resource not found"),
        500..=599 => error!(path = %request.path, status = status.as_u16(), %message, "Server error"),
        other => warn!(path = %request.path, status = other, %message, "Request failed"),
    }

    Error::from_status(status.as_u16(), message)
}
