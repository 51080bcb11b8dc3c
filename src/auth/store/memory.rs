//! In-memory token storage.

use super::TokenStorage;
use crate::auth::tokens::TokenSlot;
use crate::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// In-memory token storage.
///
/// Backs the session persistence scope: tokens live only as long as the
/// process. The storage is Clone; clones share the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStorage {
    inner: Arc<RwLock<HashMap<TokenSlot, String>>>,
}

impl MemoryTokenStorage {
    /// Create a new empty MemoryTokenStorage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of occupied slots.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Check if storage is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Clear all stored tokens.
    pub fn clear(&self) {
        self.inner.write().clear();
    }
}

impl TokenStorage for MemoryTokenStorage {
    #[instrument(skip(self))]
    fn load(&self, slot: TokenSlot) -> Result<Option<String>> {
        Ok(self.inner.read().get(&slot).cloned())
    }

    #[instrument(skip(self, token))]
    fn save(&self, slot: TokenSlot, token: &str) -> Result<()> {
        self.inner.write().insert(slot, token.to_string());
        Ok(())
    }

    #[instrument(skip(self))]
    fn remove(&self, slot: TokenSlot) -> Result<()> {
        self.inner.write().remove(&slot);
        Ok(())
    }

    fn exists(&self, slot: TokenSlot) -> Result<bool> {
        Ok(self.inner.read().contains_key(&slot))
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_new_is_empty() {
        let storage = MemoryTokenStorage::new();
        assert!(storage.load(TokenSlot::Access).unwrap().is_none());
        assert!(!storage.exists(TokenSlot::Refresh).unwrap());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_memory_save_and_load() {
        let storage = MemoryTokenStorage::new();
        storage.save(TokenSlot::Access, "access").unwrap();
        storage.save(TokenSlot::Refresh, "refresh").unwrap();
        assert_eq!(storage.load(TokenSlot::Access).unwrap().as_deref(), Some("access"));
        assert_eq!(storage.load(TokenSlot::Refresh).unwrap().as_deref(), Some("refresh"));
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn test_memory_clones_share_slots() {
        let storage = MemoryTokenStorage::new();
        let other = storage.clone();
        storage.save(TokenSlot::Access, "shared").unwrap();
        assert!(other.exists(TokenSlot::Access).unwrap());
        other.clear();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_memory_remove_is_idempotent() {
        let storage = MemoryTokenStorage::new();
        storage.save(TokenSlot::Access, "access").unwrap();
        storage.remove(TokenSlot::Access).unwrap();
        storage.remove(TokenSlot::Access).unwrap();
        assert!(!storage.exists(TokenSlot::Access).unwrap());
    }
}
