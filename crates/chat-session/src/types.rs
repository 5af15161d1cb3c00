//! Request and response types for the identity endpoint, plus the public
//! session snapshot.
//!
//! Field names follow the gateway's snake_case JSON exactly.

use serde::{Deserialize, Serialize};

// ─── User ───────────────────────────────────────────────────────────

/// The signed-in user's profile as returned by `GET /api/users/me`.
///
/// Timestamps are kept as the server's strings; the auth service emits naive
/// ISO-8601 values without an offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

// ─── Tokens ─────────────────────────────────────────────────────────

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Response from `POST /api/auth/token` and `POST /api/auth/refresh`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            token_type: default_token_type(),
            expires_in: None,
        }
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

// ─── Registration ───────────────────────────────────────────────────

/// Request body for `POST /api/auth/register`.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub display_name: String,
    pub password: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

/// Response from `POST /api/auth/register`: the new user record with the
/// freshly issued tokens alongside it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredUser {
    #[serde(flatten)]
    pub user: User,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

impl std::fmt::Debug for RegisteredUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredUser")
            .field("user", &self.user)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

// ─── Profile ────────────────────────────────────────────────────────

/// Request body for `PUT /api/users/me`. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.display_name.is_none() && self.profile_image_url.is_none()
    }
}

// ─── Session snapshot ───────────────────────────────────────────────

/// Where the session manager is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// `initialize()` has not been called yet.
    Uninitialized,
    /// Persisted state is being read and validated.
    Initializing,
    Authenticated,
    Anonymous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InitStage {
    Pending,
    Running,
    Done,
}

/// Read-only view of the session handed to observers.
///
/// The refresh token is deliberately absent.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<User>,
    pub access_token: Option<String>,
    pub is_loading: bool,
    pub(crate) stage: InitStage,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            user: None,
            access_token: None,
            is_loading: true,
            stage: InitStage::Pending,
        }
    }

    /// `true` iff both a user and an access token are present.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.access_token.is_some()
    }

    pub fn phase(&self) -> SessionPhase {
        match self.stage {
            InitStage::Pending => SessionPhase::Uninitialized,
            InitStage::Running => SessionPhase::Initializing,
            InitStage::Done if self.is_authenticated() => SessionPhase::Authenticated,
            InitStage::Done => SessionPhase::Anonymous,
        }
    }

    /// Whether `initialize()` has finished.
    pub fn is_initialized(&self) -> bool {
        self.stage == InitStage::Done
    }

    pub(crate) fn clear_credentials(&mut self) {
        self.user = None;
        self.access_token = None;
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("user", &self.user)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("is_loading", &self.is_loading)
            .field("phase", &self.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_minimal_deserialization() {
        let user: User =
            serde_json::from_value(json!({"id": "1", "email": "a@b.com", "display_name": "A"}))
                .unwrap();
        assert_eq!(user.id, "1");
        assert!(user.profile_image_url.is_none());
        assert!(user.created_at.is_none());
    }

    #[test]
    fn test_user_full_deserialization_ignores_unknown_fields() {
        let user: User = serde_json::from_value(json!({
            "id": "6f1c4a52-3e0b-4a57-9d0f-2b1f9b3c8e11",
            "email": "a@b.com",
            "display_name": "Alice",
            "is_active": true,
            "profile_image_url": "https://cdn.example.com/a.png",
            "created_at": "2024-01-01T00:00:00.123456",
            "updated_at": "2024-01-02T00:00:00"
        }))
        .unwrap();
        assert_eq!(user.display_name, "Alice");
        assert_eq!(user.created_at.as_deref(), Some("2024-01-01T00:00:00.123456"));
    }

    #[test]
    fn test_token_pair_defaults() {
        let pair: TokenPair = serde_json::from_value(json!({"access_token": "T1"})).unwrap();
        assert_eq!(pair.access_token, "T1");
        assert!(pair.refresh_token.is_none());
        assert_eq!(pair.token_type, "bearer");
    }

    #[test]
    fn test_token_pair_debug_redacts() {
        let pair = TokenPair::new("secret-access", Some("secret-refresh".into()));
        let debug = format!("{:?}", pair);
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
    }

    #[test]
    fn test_registered_user_flattened() {
        let reg: RegisteredUser = serde_json::from_value(json!({
            "id": "7",
            "email": "new@b.com",
            "display_name": "New",
            "access_token": "T7",
            "token_type": "bearer"
        }))
        .unwrap();
        assert_eq!(reg.user.id, "7");
        assert_eq!(reg.access_token, "T7");
        assert!(reg.refresh_token.is_none());
    }

    #[test]
    fn test_register_request_debug_hides_password() {
        let req = RegisterRequest {
            email: "a@b.com".into(),
            display_name: "A".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", req).contains("hunter2"));
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["display_name"], "A");
        assert_eq!(v["password"], "hunter2");
    }

    #[test]
    fn test_profile_update_skips_unset_fields() {
        let update = ProfileUpdate {
            display_name: Some("Renamed".into()),
            ..Default::default()
        };
        let v = serde_json::to_value(&update).unwrap();
        assert_eq!(v, json!({"display_name": "Renamed"}));
        assert!(!update.is_empty());
        assert!(ProfileUpdate::default().is_empty());
    }

    #[test]
    fn test_session_state_phase() {
        let mut state = SessionState::new();
        assert_eq!(state.phase(), SessionPhase::Uninitialized);
        assert!(state.is_loading);

        state.stage = InitStage::Running;
        assert_eq!(state.phase(), SessionPhase::Initializing);

        state.stage = InitStage::Done;
        assert_eq!(state.phase(), SessionPhase::Anonymous);

        state.access_token = Some("T".into());
        assert!(!state.is_authenticated());

        state.user = Some(User {
            id: "1".into(),
            email: "a@b.com".into(),
            display_name: "A".into(),
            profile_image_url: None,
            created_at: None,
            updated_at: None,
        });
        assert!(state.is_authenticated());
        assert_eq!(state.phase(), SessionPhase::Authenticated);

        state.clear_credentials();
        assert!(!state.is_authenticated());
    }
}
