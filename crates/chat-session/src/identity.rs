//! Identity endpoint capability.
//!
//! [`IdentityClient`] is the seam between the session state machine and the
//! transport. [`HttpIdentityClient`] talks to the API gateway over HTTP; tests
//! and embedders can swap in anything else that implements the trait.
//!
//! ## Endpoints
//! | Operation | Route |
//! |---|---|
//! | token issuance | `POST /api/auth/token` (form) |
//! | registration | `POST /api/auth/register` |
//! | profile fetch | `GET /api/users/me` |
//! | profile update | `PUT /api/users/me` |
//! | token refresh | `POST /api/auth/refresh` |
//! | logout | `POST /api/auth/logout` |
//! | logout everywhere | `POST /api/auth/logout-all` |

use async_trait::async_trait;

use crate::error::IdentityError;
use crate::types::{ProfileUpdate, RegisterRequest, RegisteredUser, TokenPair, User};
use crate::ClientOptions;

/// Operations the session manager needs from the identity service.
#[async_trait]
pub trait IdentityClient: Send + Sync + std::fmt::Debug {
    /// Exchange email + password for a token pair (OAuth2 password grant).
    async fn issue_token(&self, email: &str, password: &str) -> Result<TokenPair, IdentityError>;

    /// Create an account. The response carries the user and its first tokens.
    async fn register(&self, request: &RegisterRequest) -> Result<RegisteredUser, IdentityError>;

    /// Fetch the profile belonging to `access_token`.
    async fn fetch_profile(&self, access_token: &str) -> Result<User, IdentityError>;

    /// Trade a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, IdentityError>;

    /// Revoke `refresh_token` on the server.
    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), IdentityError>;

    /// Revoke every refresh token of the current user.
    async fn logout_all(&self, access_token: &str) -> Result<(), IdentityError>;

    /// Update the current user's profile.
    async fn update_profile(
        &self,
        access_token: &str,
        update: &ProfileUpdate,
    ) -> Result<User, IdentityError>;
}

// ─── HTTP implementation ────────────────────────────────────────────

/// [`IdentityClient`] over the gateway's REST API.
#[derive(Clone)]
pub struct HttpIdentityClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpIdentityClient {
    /// Create a client for the gateway at `options.base_url`.
    pub fn new(options: &ClientOptions) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = options.timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        let http = builder.build().unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: options.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(token: &str) -> String {
        format!("Bearer {}", token)
    }

    /// Map a response to `T`, or to an [`IdentityError`] carrying the body's `detail`.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, IdentityError> {
        let status = resp.status();
        let body = resp.text().await.map_err(IdentityError::network)?;

        if !status.is_success() {
            return Err(IdentityError::Status {
                status: status.as_u16(),
                detail: parse_detail(&body),
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            IdentityError::Decode(format!(
                "Failed to deserialize response: {} (body: {})",
                e,
                truncate(&body, 200)
            ))
        })
    }

    /// Like [`handle_response`](Self::handle_response) but ignores the success body.
    async fn handle_ack(resp: reqwest::Response) -> Result<(), IdentityError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(IdentityError::Status {
            status: status.as_u16(),
            detail: parse_detail(&body),
        })
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn issue_token(&self, email: &str, password: &str) -> Result<TokenPair, IdentityError> {
        tracing::debug!(url = %self.url("/api/auth/token"), "requesting token");
        let resp = self
            .http
            .post(self.url("/api/auth/token"))
            .form(&[
                ("username", email),
                ("password", password),
                ("grant_type", "password"),
            ])
            .send()
            .await
            .map_err(IdentityError::network)?;

        Self::handle_response(resp).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<RegisteredUser, IdentityError> {
        tracing::debug!(email = %request.email, "registering account");
        let resp = self
            .http
            .post(self.url("/api/auth/register"))
            .json(request)
            .send()
            .await
            .map_err(IdentityError::network)?;

        Self::handle_response(resp).await
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<User, IdentityError> {
        let resp = self
            .http
            .get(self.url("/api/users/me"))
            .header(reqwest::header::AUTHORIZATION, Self::bearer(access_token))
            .send()
            .await
            .map_err(IdentityError::network)?;

        Self::handle_response(resp).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, IdentityError> {
        let resp = self
            .http
            .post(self.url("/api/auth/refresh"))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(IdentityError::network)?;

        Self::handle_response(resp).await
    }

    async fn logout(&self, access_token: &str, refresh_token: &str) -> Result<(), IdentityError> {
        let resp = self
            .http
            .post(self.url("/api/auth/logout"))
            .header(reqwest::header::AUTHORIZATION, Self::bearer(access_token))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(IdentityError::network)?;

        Self::handle_ack(resp).await
    }

    async fn logout_all(&self, access_token: &str) -> Result<(), IdentityError> {
        let resp = self
            .http
            .post(self.url("/api/auth/logout-all"))
            .header(reqwest::header::AUTHORIZATION, Self::bearer(access_token))
            .send()
            .await
            .map_err(IdentityError::network)?;

        Self::handle_ack(resp).await
    }

    async fn update_profile(
        &self,
        access_token: &str,
        update: &ProfileUpdate,
    ) -> Result<User, IdentityError> {
        let resp = self
            .http
            .put(self.url("/api/users/me"))
            .header(reqwest::header::AUTHORIZATION, Self::bearer(access_token))
            .json(update)
            .send()
            .await
            .map_err(IdentityError::network)?;

        Self::handle_response(resp).await
    }
}

impl std::fmt::Debug for HttpIdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIdentityClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Extract the human-readable message from an error body.
///
/// The gateway answers `{"detail": "..."}`; request validation failures come
/// back as `{"detail": [{"msg": "...", ...}, ...]}` and are joined with `; `.
pub(crate) fn parse_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join("; "))
            }
        }
        _ => None,
    }
}

fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
