//! Error types.
//!
//! Three layers, one per seam:
//! - [`IdentityError`] — what the identity transport reports (network, status, decode).
//! - [`StoreError`] — what the persistent store reports.
//! - [`SessionError`] — what callers of the session manager see. Its `Display`
//!   is the human-readable message only, so a UI can show it as-is.

/// Errors reported by an [`IdentityClient`](crate::IdentityClient).
///
/// A non-success HTTP status keeps the server's `detail` message when the body
/// carried one, mirroring the `{ "detail": ... }` shape the gateway returns.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// Network-level error (DNS, connection refused, TLS, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status}: {}", detail.as_deref().unwrap_or("no detail"))]
    Status {
        status: u16,
        detail: Option<String>,
    },

    /// The success body could not be decoded.
    #[error("Deserialization error: {0}")]
    Decode(String),
}

impl IdentityError {
    /// Create a network error from a reqwest error.
    pub fn network(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }

    /// Get the HTTP status code, if applicable.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-provided `detail` message, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` if this is a network-level error.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    /// Returns `true` if this is an authentication error (401).
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }
}

/// Errors reported by a [`SessionStore`](crate::SessionStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage is corrupt: {0}")]
    Corrupt(String),

    #[error("Storage operation failed: {0}")]
    OperationFailed(String),
}

/// Errors surfaced to callers of the [`SessionManager`](crate::SessionManager).
///
/// The `Display` output is exactly the message, either the server's `detail`
/// or a generic fallback such as `"Login failed"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Token issuance was rejected.
    #[error("{0}")]
    InvalidCredentials(String),

    /// Registration was rejected because the account already exists.
    #[error("{0}")]
    DuplicateAccount(String),

    /// Registration was rejected for any other reason (validation, policy).
    #[error("{0}")]
    RegistrationRejected(String),

    /// The identity endpoint could not be reached.
    #[error("{0}")]
    NetworkUnavailable(String),

    /// Tokens were issued but the profile could not be fetched.
    #[error("{0}")]
    ProfileFetchFailed(String),

    /// The profile update was rejected.
    #[error("{0}")]
    ProfileUpdateFailed(String),

    /// No valid credentials remain; the session has been cleared.
    #[error("{0}")]
    SessionExpired(String),

    /// Another state-changing operation is already in flight.
    #[error("{0}")]
    Busy(String),

    /// The persistent store failed while committing the session.
    #[error("{0}")]
    Storage(String),
}

pub(crate) const LOGIN_FAILED: &str = "Login failed";
pub(crate) const REGISTRATION_FAILED: &str = "Registration failed";
pub(crate) const PROFILE_FETCH_FAILED: &str = "Failed to fetch user profile";
pub(crate) const PROFILE_UPDATE_FAILED: &str = "Failed to update profile";
pub(crate) const SESSION_EXPIRED: &str = "Session expired";
pub(crate) const OPERATION_IN_PROGRESS: &str = "Another authentication request is in progress";
pub(crate) const OPERATION_ABORTED: &str = "Authentication request was aborted";

impl SessionError {
    /// The caller-facing message.
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidCredentials(m)
            | Self::DuplicateAccount(m)
            | Self::RegistrationRejected(m)
            | Self::NetworkUnavailable(m)
            | Self::ProfileFetchFailed(m)
            | Self::ProfileUpdateFailed(m)
            | Self::SessionExpired(m)
            | Self::Busy(m)
            | Self::Storage(m) => m,
        }
    }

    /// Map a token-issuance failure.
    pub(crate) fn from_login(err: IdentityError) -> Self {
        match err {
            IdentityError::Network(msg) => Self::NetworkUnavailable(msg),
            other => Self::InvalidCredentials(message_or(&other, LOGIN_FAILED)),
        }
    }

    /// Map a registration failure.
    ///
    /// 409, or a 400 whose detail says the account is already there, is a
    /// duplicate; the gateway reports "Email already registered" as a 400.
    pub(crate) fn from_register(err: IdentityError) -> Self {
        match err {
            IdentityError::Network(msg) => Self::NetworkUnavailable(msg),
            other => {
                let message = message_or(&other, REGISTRATION_FAILED);
                let duplicate = match other.status() {
                    Some(409) => true,
                    Some(400) => mentions_existing_account(&message),
                    _ => false,
                };
                if duplicate {
                    Self::DuplicateAccount(message)
                } else {
                    Self::RegistrationRejected(message)
                }
            }
        }
    }

    /// Map a profile fetch failure.
    pub(crate) fn from_profile_fetch(err: IdentityError) -> Self {
        match err {
            IdentityError::Network(msg) => Self::NetworkUnavailable(msg),
            _ => Self::ProfileFetchFailed(PROFILE_FETCH_FAILED.into()),
        }
    }

    /// Map a profile update failure.
    pub(crate) fn from_profile_update(err: IdentityError) -> Self {
        match err {
            IdentityError::Network(msg) => Self::NetworkUnavailable(msg),
            other => Self::ProfileUpdateFailed(message_or(&other, PROFILE_UPDATE_FAILED)),
        }
    }

    pub(crate) fn expired() -> Self {
        Self::SessionExpired(SESSION_EXPIRED.into())
    }

    pub(crate) fn busy() -> Self {
        Self::Busy(OPERATION_IN_PROGRESS.into())
    }

    /// The operation's task was torn down before finishing (runtime shutdown).
    pub(crate) fn aborted() -> Self {
        Self::NetworkUnavailable(OPERATION_ABORTED.into())
    }

    pub(crate) fn storage(err: StoreError) -> Self {
        Self::Storage(err.to_string())
    }

    /// Returns `true` if the session was cleared as part of this error.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }
}

fn message_or(err: &IdentityError, fallback: &str) -> String {
    err.detail()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn mentions_existing_account(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("already registered") || lower.contains("already exists")
}
