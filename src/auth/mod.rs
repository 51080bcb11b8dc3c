//! Authentication: token persistence, session state and the login/refresh
//! lifecycle.

pub mod manager;
pub mod session;
pub mod store;
pub mod tokens;
pub mod vault;

pub use manager::AuthManager;
pub use session::{PersistenceScope, Session, SessionEvent};
pub use store::{FileTokenStorage, MemoryTokenStorage, TokenStorage};
pub use tokens::{Registration, TokenPair, TokenSlot};
pub use vault::TokenVault;

#[cfg(feature = "system-keyring")]
pub use store::KeyringTokenStorage;
