//! # Chat Session Client
//!
//! Client-side session management for the chat application's API gateway.
//! Owns the signed-in user and their tokens, keeps them in a persistent store
//! across restarts, and exposes login, register, logout and token refresh
//! with defined failure recovery.
//!
//! The transport ([`IdentityClient`]) and the storage ([`SessionStore`]) are
//! injected, so the same state machine runs over HTTP in production and over
//! in-process fakes in tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chat_session::{ClientOptions, MemoryStore, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = SessionManager::from_options(
//!         &ClientOptions::from_env(),
//!         Arc::new(MemoryStore::new()),
//!     );
//!
//!     session.initialize().await;
//!
//!     let user = session.login("alice@example.com", "Password1").await?;
//!     println!("Signed in as {}", user.display_name);
//!
//!     // Use the access token for other services
//!     let header = session.authorization_header();
//!     println!("Authorization: {:?}", header);
//!
//!     session.logout().await;
//!     Ok(())
//! }
//! ```

pub mod env;
mod error;
pub mod guard;
mod identity;
mod manager;
mod session;
pub mod store;
mod types;

pub use error::*;
pub use guard::{guard, wait_for_decision, RouteDecision};
pub use identity::*;
pub use manager::SessionManager;
pub use session::*;
pub use store::{FileStore, MemoryStore, SessionStore};
pub use types::*;

/// Default gateway address, matching the development setup.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

// ─── Client Options ────────────────────────────────────────────────

/// Configuration for the HTTP identity client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Base URL of the API gateway (e.g. `http://localhost:8000`).
    pub base_url: String,

    /// Optional request timeout in seconds. `None` means no timeout.
    pub timeout_secs: Option<u64>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = ClientOptions::default();
        assert_eq!(opts.base_url, "http://localhost:8000");
        assert!(opts.timeout_secs.is_none());
    }
}
