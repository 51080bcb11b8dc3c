//! Two-scope token persistence.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::auth::session::PersistenceScope;
use crate::auth::store::TokenStorage;
use crate::auth::tokens::{TokenPair, TokenSlot};
use crate::error::Result;

/// Holds the durable and session-scoped storages and keeps a token pair in
/// exactly one of them.
#[derive(Clone)]
pub struct TokenVault {
    durable: Arc<dyn TokenStorage>,
    session: Arc<dyn TokenStorage>,
}

impl TokenVault {
    pub fn new(durable: Arc<dyn TokenStorage>, session: Arc<dyn TokenStorage>) -> Self {
        Self { durable, session }
    }

    fn storage(&self, scope: PersistenceScope) -> &dyn TokenStorage {
        match scope {
            PersistenceScope::Durable => self.durable.as_ref(),
            PersistenceScope::Session => self.session.as_ref(),
        }
    }

    fn other(scope: PersistenceScope) -> PersistenceScope {
        match scope {
            PersistenceScope::Durable => PersistenceScope::Session,
            PersistenceScope::Session => PersistenceScope::Durable,
        }
    }

    /// Persist a pair in `scope` and drop whatever the other scope held.
    pub fn store(&self, scope: PersistenceScope, pair: &TokenPair) -> Result<()> {
        let storage = self.storage(scope);
        storage.save(TokenSlot::Access, &pair.access)?;
        storage.save(TokenSlot::Refresh, &pair.refresh)?;

        let stale = self.storage(Self::other(scope));
        for slot in TokenSlot::ALL {
            if let Err(e) = stale.remove(slot) {
                warn!(backend = stale.name(), %slot, error = %e, "Failed to clear stale token");
            }
        }
        debug!(%scope, backend = storage.name(), "Stored token pair");
        Ok(())
    }

    /// Load a complete pair, durable scope first. A scope holding only one of
    /// the two slots does not count.
    pub fn load(&self) -> Result<Option<(PersistenceScope, TokenPair)>> {
        for scope in [PersistenceScope::Durable, PersistenceScope::Session] {
            let storage = self.storage(scope);
            let access = storage.load(TokenSlot::Access)?;
            let refresh = storage.load(TokenSlot::Refresh)?;
            if let (Some(access), Some(refresh)) = (access, refresh) {
                return Ok(Some((scope, TokenPair { access, refresh })));
            }
        }
        Ok(None)
    }

    /// Scope currently holding an access token.
    pub fn locate_access(&self) -> Result<Option<PersistenceScope>> {
        for scope in [PersistenceScope::Durable, PersistenceScope::Session] {
            if self.storage(scope).exists(TokenSlot::Access)? {
                return Ok(Some(scope));
            }
        }
        Ok(None)
    }

    /// Replace only the access token in `scope`.
    pub fn update_access(&self, scope: PersistenceScope, access: &str) -> Result<()> {
        self.storage(scope).save(TokenSlot::Access, access)
    }

    /// Remove both slots from both scopes. Every removal is attempted; the
    /// first failure is returned afterwards.
    pub fn clear(&self) -> Result<()> {
        let mut first_error = None;
        for scope in [PersistenceScope::Durable, PersistenceScope::Session] {
            let storage = self.storage(scope);
            for slot in TokenSlot::ALL {
                if let Err(e) = storage.remove(slot) {
                    warn!(backend = storage.name(), %slot, error = %e, "Failed to remove token");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for TokenVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVault")
            .field("durable", &self.durable.name())
            .field("session", &self.session.name())
            .finish()
    }
}
