//! Client core for the failure-stories feed.
//!
//! [`FeedClient`] owns one of each component: the [`AuthManager`] session, the
//! token-refreshing [`ApiClient`], the [`ResponseCache`] and the typed
//! resource handles built on them.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod liveness;
pub mod models;
pub mod net;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::api::{CommentsApi, PostsApi, Resources, UsersApi};
use crate::auth::{AuthManager, MemoryTokenStorage, SessionEvent, TokenStorage, TokenVault};
use crate::cache::{ResponseCache, SweeperHandle};
use crate::config::{Config, StorageBackend};
use crate::net::{ApiClient, HttpClient};

pub use crate::error::{Error, Result};
pub use crate::liveness::Liveness;

/// Service object tying the components together. Cheap to clone.
#[derive(Clone)]
pub struct FeedClient {
    config: Arc<Config>,
    auth: AuthManager,
    api: ApiClient,
    resources: Resources,
    _sweeper: Option<Arc<SweeperHandle>>,
}

impl FeedClient {
    /// Build a client with the durable storage backend named in `config`.
    pub fn new(config: Config) -> Result<Self> {
        let durable = durable_storage(&config)?;
        Self::with_storage(config, durable, Arc::new(MemoryTokenStorage::new()))
    }

    /// Build a client over explicit durable and session-scoped storages.
    ///
    /// The cache sweeper starts only when called inside a tokio runtime.
    pub fn with_storage(
        config: Config,
        durable: Arc<dyn TokenStorage>,
        session: Arc<dyn TokenStorage>,
    ) -> Result<Self> {
        let http = HttpClient::from_config(&config.api)?;
        let vault = TokenVault::new(durable, session);
        let auth = AuthManager::new(
            http.clone(),
            config.api.base_url.clone(),
            config.endpoints.clone(),
            vault,
        );
        let api = ApiClient::new(http, config.api.base_url.clone(), auth.clone());
        let cache = ResponseCache::new(config.cache.ttl());

        // Cached bodies carry per-user state, so they never outlive the
        // session they were fetched under.
        let session_cache = cache.clone();
        auth.on_session_change(move |event| match event {
            SessionEvent::LoggedIn { .. } | SessionEvent::LoggedOut => {
                debug!(?event, "Session changed, dropping cached responses");
                session_cache.clear();
            }
            SessionEvent::SignInRequired { .. } => {}
        });

        let sweeper = match (config.cache.sweep_interval(), tokio::runtime::Handle::try_current()) {
            (Some(period), Ok(_)) => Some(Arc::new(cache.spawn_sweeper(period))),
            (Some(_), Err(_)) => {
                warn!("No tokio runtime, cache sweeper not started");
                None
            }
            (None, _) => None,
        };

        debug!(base_url = %config.api.base_url, "Feed client ready");
        Ok(Self {
            config: Arc::new(config),
            auth,
            resources: Resources::new(api.clone(), cache),
            api,
            _sweeper: sweeper,
        })
    }

    /// Restore a persisted session; see [`AuthManager::initialize_auth`].
    pub async fn initialize(&self) -> Result<()> {
        self.auth.initialize_auth().await
    }

    /// Log out. Cached responses go with the session.
    pub fn logout(&self) {
        self.auth.logout();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &ResponseCache<Value> {
        self.resources.cache()
    }

    pub fn posts(&self) -> PostsApi {
        PostsApi::new(self.resources.clone())
    }

    pub fn comments(&self) -> CommentsApi {
        CommentsApi::new(self.resources.clone())
    }

    pub fn users(&self) -> UsersApi {
        UsersApi::new(self.resources.clone())
    }

    /// Resolve a media path against the configured media base URL.
    pub fn media_url(&self, path: Option<&str>) -> String {
        api::media_url(&self.config.api.media_base_url, path)
    }
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("auth", &self.auth)
            .field("api", &self.api)
            .field("cache", self.resources.cache())
            .finish()
    }
}

fn durable_storage(config: &Config) -> Result<Arc<dyn TokenStorage>> {
    match config.storage.backend {
        StorageBackend::File => Ok(Arc::new(auth::FileTokenStorage::new(
            config.storage.token_dir.clone(),
        ))),
        StorageBackend::Memory => Ok(Arc::new(MemoryTokenStorage::new())),
        #[cfg(feature = "system-keyring")]
        StorageBackend::Keyring => Ok(Arc::new(auth::KeyringTokenStorage::new())),
        #[cfg(not(feature = "system-keyring"))]
        StorageBackend::Keyring => Err(Error::Config(
            "storage.backend = \"keyring\" requires the system-keyring feature".into(),
        )),
    }
}
