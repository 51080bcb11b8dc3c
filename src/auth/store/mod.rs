//! Token storage implementations.

pub mod file;
pub mod memory;
pub mod trait_def;
#[cfg(feature = "system-keyring")]
pub mod keyring;

pub use file::FileTokenStorage;
pub use memory::MemoryTokenStorage;
pub use trait_def::TokenStorage;

#[cfg(feature = "system-keyring")]
pub use keyring::KeyringTokenStorage;
