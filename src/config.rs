use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Environment override tracking
// ---------------------------------------------------------------------------

/// Tracks which configuration settings are overridden by environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    overrides: HashSet<String>,
}

impl EnvOverrides {
    /// Check whether a setting key (e.g. "api.base_url") is overridden by an env var.
    pub fn is_overridden(&self, key: &str) -> bool {
        self.overrides.contains(key)
    }

    fn record(&mut self, key: &str) {
        self.overrides.insert(key.to_string());
    }
}

// ---------------------------------------------------------------------------
// Main configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Env var overrides are not serialized to TOML.
    #[serde(skip)]
    pub env_overrides: EnvOverrides,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Root of the REST API; endpoint paths are joined onto it.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Origin that relative media paths are resolved against.
    #[serde(default = "default_media_base_url")]
    pub media_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            media_base_url: default_media_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: None,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Paths of the authentication endpoints, relative to `api.base_url`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_login_path")]
    pub login: String,
    #[serde(default = "default_register_path")]
    pub register: String,
    #[serde(default = "default_federated_path")]
    pub federated: String,
    #[serde(default = "default_refresh_path")]
    pub refresh: String,
    #[serde(default = "default_profile_path")]
    pub profile: String,
    /// Client route published with `SessionEvent::SignInRequired`.
    #[serde(default = "default_sign_in_route")]
    pub sign_in_route: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            login: default_login_path(),
            register: default_register_path(),
            federated: default_federated_path(),
            refresh: default_refresh_path(),
            profile: default_profile_path(),
            sign_in_route: default_sign_in_route(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
    /// Period of the background sweep. Zero disables the sweeper.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Backend used for the durable ("remember me") scope.
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_token_dir")]
    pub token_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            token_dir: default_token_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Keyring => write!(f, "keyring"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("Unknown storage backend: {s}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}
fn default_media_base_url() -> String {
    "http://localhost:8000".to_string()
}
const fn default_timeout_secs() -> u64 {
    10
}
const fn default_connect_timeout_secs() -> u64 {
    5
}
fn default_login_path() -> String {
    "/users/login/".to_string()
}
fn default_register_path() -> String {
    "/users/register/".to_string()
}
fn default_federated_path() -> String {
    "/users/google/".to_string()
}
fn default_refresh_path() -> String {
    "/users/token/refresh/".to_string()
}
fn default_profile_path() -> String {
    "/users/profile/".to_string()
}
fn default_sign_in_route() -> String {
    "/login".to_string()
}
const fn default_cache_ttl_secs() -> u64 {
    300
}
const fn default_sweep_interval_secs() -> u64 {
    300
}
fn default_storage_backend() -> StorageBackend {
    StorageBackend::File
}
fn default_token_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("failfeed")
        .join("tokens")
}
fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Config loading and env overrides
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a TOML file, then apply environment variable
    /// overrides. Any setting prefixed with `FAILFEED_` takes precedence over
    /// the file value and is tracked in `env_overrides`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Save the current (file-level) configuration to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings the client cannot start with.
    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.api.base_url)
            .map_err(|e| anyhow::anyhow!("Invalid api.base_url '{}': {e}", self.api.base_url))?;
        url::Url::parse(&self.api.media_base_url).map_err(|e| {
            anyhow::anyhow!(
                "Invalid api.media_base_url '{}': {e}",
                self.api.media_base_url
            )
        })?;
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        let mut ov = EnvOverrides::default();

        macro_rules! env_str {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = val;
                    ov.record($key);
                }
            };
        }
        macro_rules! env_bool {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
                    ov.record($key);
                }
            };
        }
        macro_rules! env_parse {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    if let Ok(parsed) = val.parse() {
                        $field = parsed;
                        ov.record($key);
                    }
                }
            };
        }
        macro_rules! env_path {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = PathBuf::from(val);
                    ov.record($key);
                }
            };
        }
        macro_rules! env_opt_str {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = if val.is_empty() { None } else { Some(val) };
                    ov.record($key);
                }
            };
        }

        // -- API --
        env_str!("api.base_url", "FAILFEED_API_BASE_URL", self.api.base_url);
        env_str!(
            "api.media_base_url",
            "FAILFEED_API_MEDIA_BASE_URL",
            self.api.media_base_url
        );
        env_parse!(
            "api.timeout_secs",
            "FAILFEED_API_TIMEOUT_SECS",
            self.api.timeout_secs
        );
        env_parse!(
            "api.connect_timeout_secs",
            "FAILFEED_API_CONNECT_TIMEOUT_SECS",
            self.api.connect_timeout_secs
        );
        env_opt_str!(
            "api.user_agent",
            "FAILFEED_API_USER_AGENT",
            self.api.user_agent
        );

        // -- Endpoints --
        env_str!("endpoints.login", "FAILFEED_ENDPOINTS_LOGIN", self.endpoints.login);
        env_str!(
            "endpoints.register",
            "FAILFEED_ENDPOINTS_REGISTER",
            self.endpoints.register
        );
        env_str!(
            "endpoints.federated",
            "FAILFEED_ENDPOINTS_FEDERATED",
            self.endpoints.federated
        );
        env_str!(
            "endpoints.profile",
            "FAILFEED_ENDPOINTS_PROFILE",
            self.endpoints.profile
        );
        env_str!(
            "endpoints.refresh",
            "FAILFEED_ENDPOINTS_REFRESH",
            self.endpoints.refresh
        );
        env_str!(
            "endpoints.sign_in_route",
            "FAILFEED_ENDPOINTS_SIGN_IN_ROUTE",
            self.endpoints.sign_in_route
        );

        // -- Cache --
        env_parse!("cache.ttl_secs", "FAILFEED_CACHE_TTL_SECS", self.cache.ttl_secs);
        env_parse!(
            "cache.sweep_interval_secs",
            "FAILFEED_CACHE_SWEEP_INTERVAL_SECS",
            self.cache.sweep_interval_secs
        );

        // -- Storage --
        if let Ok(val) = std::env::var("FAILFEED_STORAGE_BACKEND") {
            if let Ok(backend) = val.parse() {
                self.storage.backend = backend;
                ov.record("storage.backend");
            }
        }
        env_path!(
            "storage.token_dir",
            "FAILFEED_STORAGE_TOKEN_DIR",
            self.storage.token_dir
        );

        // -- Logging --
        env_str!("logging.level", "FAILFEED_LOG_LEVEL", self.logging.level);
        env_bool!("logging.json", "FAILFEED_LOG_JSON", self.logging.json);

        self.env_overrides = ov;
    }
}

// Helper for default token storage directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local").join("share"))
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
