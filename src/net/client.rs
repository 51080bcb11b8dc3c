//! Shared HTTP client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, ClientBuilder};

use crate::config::ApiConfig;
use crate::error::{Error, Result};

/// Default user agent for the application.
pub const USER_AGENT: &str = concat!("failfeed/", env!("CARGO_PKG_VERSION"));

/// Default connection timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Name of the anti-forgery cookie forwarded as `X-CSRFToken`.
pub const CSRF_COOKIE: &str = "csrftoken";

/// reqwest client plus the cookie jar it writes to.
///
/// Clones share the connection pool and the jar, so the authentication calls
/// and the API calls see the same cookies.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    cookies: Arc<Jar>,
}

impl HttpClient {
    /// Create a new builder.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Build a client from the `[api]` configuration section.
    pub fn from_config(config: &ApiConfig) -> Result<Self> {
        let mut builder = Self::builder()
            .connect_timeout(config.connect_timeout())
            .request_timeout(config.timeout());
        if let Some(ua) = &config.user_agent {
            builder = builder.user_agent(ua);
        }
        builder.build()
    }

    /// Get the inner reqwest client.
    pub fn inner(&self) -> &Client {
        &self.inner
    }

    pub fn cookies(&self) -> &Arc<Jar> {
        &self.cookies
    }

    /// Value of the `csrftoken` cookie the jar would send to `url`.
    pub fn csrf_token(&self, url: &str) -> Option<String> {
        let url = url::Url::parse(url).ok()?;
        let header = self.cookies.cookies(&url)?;
        super::headers::cookie_value(header.to_str().ok()?, CSRF_COOKIE)
    }
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
    builder: ClientBuilder,
    cookies: Arc<Jar>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            builder: Client::builder()
                .user_agent(USER_AGENT)
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(REQUEST_TIMEOUT),
            cookies: Arc::new(Jar::default()),
        }
    }
}

impl HttpClientBuilder {
    /// Set a custom user agent.
    pub fn user_agent(mut self, ua: &str) -> Self {
        self.builder = self.builder.user_agent(ua);
        self
    }

    /// Set connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.builder = self.builder.connect_timeout(timeout);
        self
    }

    /// Set request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.builder = self.builder.timeout(timeout);
        self
    }

    /// Use an existing cookie jar.
    pub fn cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.cookies = jar;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<HttpClient> {
        let inner = self
            .builder
            .cookie_provider(Arc::clone(&self.cookies))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(HttpClient {
            inner,
            cookies: self.cookies,
        })
    }
}
