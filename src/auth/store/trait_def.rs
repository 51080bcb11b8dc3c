//! Token storage trait.

use crate::auth::tokens::TokenSlot;
use crate::error::Result;
use std::sync::Arc;

/// Trait for token storage backends.
///
/// All storage implementations must be thread-safe (`Send + Sync`). A backend
/// holds at most one token per [`TokenSlot`].
pub trait TokenStorage: Send + Sync {
    /// Load the token stored in a slot, if any.
    fn load(&self, slot: TokenSlot) -> Result<Option<String>>;

    /// Save a token into a slot, replacing what was there.
    fn save(&self, slot: TokenSlot, token: &str) -> Result<()>;

    /// Remove the token in a slot. Removing an empty slot is not an error.
    fn remove(&self, slot: TokenSlot) -> Result<()>;

    /// Check if a slot holds a token.
    fn exists(&self, slot: TokenSlot) -> Result<bool> {
        Ok(self.load(slot)?.is_some())
    }

    /// Get the name of this storage backend.
    fn name(&self) -> &str;
}

// Blanket implementation for Arc<T>
impl<T: TokenStorage + ?Sized> TokenStorage for Arc<T> {
    fn load(&self, slot: TokenSlot) -> Result<Option<String>> {
        (**self).load(slot)
    }
    fn save(&self, slot: TokenSlot, token: &str) -> Result<()> {
        (**self).save(slot, token)
    }
    fn remove(&self, slot: TokenSlot) -> Result<()> {
        (**self).remove(slot)
    }
    fn exists(&self, slot: TokenSlot) -> Result<bool> {
        (**self).exists(slot)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}

// Blanket implementation for Box<T>
impl<T: TokenStorage + ?Sized> TokenStorage for Box<T> {
    fn load(&self, slot: TokenSlot) -> Result<Option<String>> {
        (**self).load(slot)
    }
    fn save(&self, slot: TokenSlot, token: &str) -> Result<()> {
        (**self).save(slot, token)
    }
    fn remove(&self, slot: TokenSlot) -> Result<()> {
        (**self).remove(slot)
    }
    fn exists(&self, slot: TokenSlot) -> Result<bool> {
        (**self).exists(slot)
    }
    fn name(&self) -> &str {
        (**self).name()
    }
}
