// Command implementations. Every command runs against one initialized
// session backed by the session file.

pub mod login;
pub mod logout;
pub mod profile;
pub mod refresh;
pub mod register;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use chat_session::{ClientOptions, FileStore, SessionManager};

use crate::GlobalArgs;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Get the directory holding the session file.
fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".chat-session")
}

/// Get the default session file path.
fn default_store_path() -> PathBuf {
    config_dir().join("session.json")
}

/// What every command runs against.
pub struct Context {
    pub session: SessionManager,
    pub store_path: PathBuf,
    pub api_url: String,
}

impl Context {
    /// Build the session manager from flags and env, then restore any saved session.
    pub async fn open(args: &GlobalArgs) -> Result<Self, Box<dyn std::error::Error>> {
        let mut options = ClientOptions::from_env();
        if let Some(ref url) = args.api_url {
            options.base_url = url.clone();
        }
        if args.timeout.is_some() {
            options.timeout_secs = args.timeout;
        }

        let store_path = args.store.clone().unwrap_or_else(default_store_path);
        tracing::debug!(store = %store_path.display(), api = %options.base_url, "opening session");

        let store = Arc::new(FileStore::new(&store_path));
        let session = SessionManager::from_options(&options, store);
        session.initialize().await;

        Ok(Self {
            session,
            store_path,
            api_url: options.base_url,
        })
    }
}

/// Read a password from the terminal without echo.
pub fn prompt_password(confirm: bool) -> Result<String, Box<dyn std::error::Error>> {
    let mut prompt = dialoguer::Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords do not match");
    }
    Ok(prompt.interact()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_store_path() {
        let path = default_store_path();
        assert!(path.ends_with(".chat-session/session.json"));
    }
}
