//! ims-auth: login, logout, token persistence and site selection.

pub mod hooks;
pub mod service;
pub mod token;

pub use hooks::SessionExpiryHook;
pub use service::{AuthService, LoginRequest, LoginResponse};
pub use token::{FileTokenStore, MemoryTokenStore, StoredToken, StoredTokens, TokenStore, TokenStoreError};
