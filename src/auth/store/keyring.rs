//! Keyring-based token storage.

use super::TokenStorage;
use crate::auth::tokens::TokenSlot;
use crate::error::{Error, Result};
use tracing::instrument;

/// Keyring-based token storage.
///
/// Durable scope backed by the system's native credential store. Each slot is
/// one keyring entry under the service name.
///
/// Feature-gated behind `system-keyring`.
#[derive(Debug, Clone)]
pub struct KeyringTokenStorage {
    service: String,
}

impl Default for KeyringTokenStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringTokenStorage {
    const SERVICE_NAME: &str = "failfeed";

    /// Create a new KeyringTokenStorage with default service name.
    pub fn new() -> Self {
        Self {
            service: Self::SERVICE_NAME.to_string(),
        }
    }

    /// Create a KeyringTokenStorage with a custom service name.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, slot: TokenSlot) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, slot.key())
            .map_err(|e| Error::Storage(format!("Failed to create keyring entry: {}", e)))
    }
}

impl TokenStorage for KeyringTokenStorage {
    #[instrument(skip(self))]
    fn load(&self, slot: TokenSlot) -> Result<Option<String>> {
        match self.entry(slot)?.get_password() {
            Ok(token) if token.is_empty() => Ok(None),
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(Error::Storage(format!("Keyring error: {}", e))),
        }
    }

    #[instrument(skip(self, token))]
    fn save(&self, slot: TokenSlot, token: &str) -> Result<()> {
        self.entry(slot)?
            .set_password(token)
            .map_err(|e| Error::Storage(format!("Keyring error: {}", e)))
    }

    #[instrument(skip(self))]
    fn remove(&self, slot: TokenSlot) -> Result<()> {
        match self.entry(slot)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(Error::Storage(format!("Keyring error: {}", e))),
        }
    }

    fn name(&self) -> &str {
        "keyring"
    }
}
