//! The session manager: owns who is signed in and keeps memory and the
//! persistent store in step.
//!
//! ## Lifecycle
//! `Uninitialized → Initializing → {Authenticated, Anonymous}`. Login and
//! register move to `Authenticated`; logout, a failed refresh, or corrupted
//! persisted state move to `Anonymous`.
//!
//! ## Commit rules
//! - Login and register commit user and tokens together, or nothing.
//! - Any invalidation clears user, access token and refresh token together.
//! - Store writes go `user`, `refreshToken`, `token`; clears remove `token`
//!   first. The access token is the marker `initialize()` looks for.
//!
//! ## Concurrency
//! One async mutex per manager serializes state changes. `login`, `register`
//! and `update_profile` fail fast with [`SessionError::Busy`] instead of
//! queueing; `initialize`, `logout` and `logout_all` wait their turn; a
//! `refresh` that waited behind another refresh reuses that outcome, as long
//! as nothing else touched the session in between.
//!
//! Every operation runs on its own task. Dropping the returned future stops
//! the wait, not the work: the request and its state change still complete,
//! and `is_loading` is released by a drop guard.

use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};

use crate::error::{SessionError, StoreError};
use crate::identity::{HttpIdentityClient, IdentityClient};
use crate::session::{SessionBroadcast, SessionEvent};
use crate::store::{keys, SessionStore};
use crate::types::{InitStage, ProfileUpdate, RegisterRequest, SessionState, User};
use crate::ClientOptions;

/// State only ever touched while holding the operation lock.
struct Vault {
    refresh_token: Option<String>,
    /// Epoch reached by the last refresh, and whether it succeeded.
    last_refresh: Option<(u64, bool)>,
}

struct Shared {
    identity: Arc<dyn IdentityClient>,
    store: Arc<dyn SessionStore>,
    state: watch::Sender<SessionState>,
    vault: Arc<Mutex<Vault>>,
    /// Only changed while holding `vault`.
    loading_depth: AtomicU32,
    /// Bumped by every refresh and every credential change.
    refresh_epoch: AtomicU64,
    events: SessionBroadcast,
}

impl Shared {
    fn publish_loading(&self) {
        let loading = self.loading_depth.load(Ordering::SeqCst) > 0;
        self.state.send_if_modified(|s| {
            if s.is_loading == loading {
                return false;
            }
            s.is_loading = loading;
            true
        });
    }
}

/// Keeps `is_loading` raised until dropped.
struct Loading<'a> {
    shared: &'a Shared,
}

impl<'a> Loading<'a> {
    fn begin(shared: &'a Shared) -> Self {
        shared.loading_depth.fetch_add(1, Ordering::SeqCst);
        shared.publish_loading();
        Self { shared }
    }
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.shared.loading_depth.fetch_sub(1, Ordering::SeqCst);
        self.shared.publish_loading();
    }
}

/// Run `future` on its own task and wait for it. The task keeps going if the
/// caller is dropped. `None` only when the runtime tore the task down.
async fn detached<T>(future: impl Future<Output = T> + Send + 'static) -> Option<T>
where
    T: Send + 'static,
{
    match tokio::spawn(future).await {
        Ok(value) => Some(value),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => {
            tracing::warn!(error = %e, "session task aborted");
            None
        }
    }
}

/// Session from the persistent store, before validation.
struct Persisted {
    user: User,
    access_token: String,
    refresh_token: Option<String>,
}

/// Handle to the client's single session.
///
/// Cloning is cheap and every clone refers to the same session; construct one
/// at startup and hand clones to whatever needs it.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use chat_session::{ClientOptions, FileStore, SessionManager};
///
/// # async fn example() -> Result<(), chat_session::SessionError> {
/// let store = Arc::new(FileStore::new("/tmp/chat-session/session.json"));
/// let session = SessionManager::from_options(&ClientOptions::default(), store);
///
/// session.initialize().await;
/// if !session.is_authenticated() {
///     session.login("a@b.com", "Secret123").await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl SessionManager {
    /// Create a manager over the given identity client and store.
    pub fn new(identity: Arc<dyn IdentityClient>, store: Arc<dyn SessionStore>) -> Self {
        let (state, _) = watch::channel(SessionState::new());
        Self {
            shared: Arc::new(Shared {
                identity,
                store,
                state,
                vault: Arc::new(Mutex::new(Vault {
                    refresh_token: None,
                    last_refresh: None,
                })),
                loading_depth: AtomicU32::new(0),
                refresh_epoch: AtomicU64::new(0),
                events: SessionBroadcast::new(),
            }),
        }
    }

    /// Create a manager that talks HTTP to the gateway described by `options`.
    pub fn from_options(options: &ClientOptions, store: Arc<dyn SessionStore>) -> Self {
        Self::new(Arc::new(HttpIdentityClient::new(options)), store)
    }

    // ─── Observation ────────────────────────────────────────────────

    /// Snapshot of the current session.
    pub fn state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    /// Receiver that sees every settled state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Receiver for discrete session events (navigation hints).
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.shared.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().is_loading
    }

    pub fn user(&self) -> Option<User> {
        self.shared.state.borrow().user.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.shared.state.borrow().access_token.clone()
    }

    /// `Authorization` header value for calls to other services, when signed in.
    pub fn authorization_header(&self) -> Option<String> {
        let state = self.shared.state.borrow();
        if !state.is_authenticated() {
            return None;
        }
        state.access_token.as_ref().map(|t| format!("Bearer {}", t))
    }

    // ─── Operations ─────────────────────────────────────────────────

    /// Hydrate from the persistent store and validate with a refresh.
    ///
    /// Runs once; later calls return the current state. `is_loading` is false
    /// when this returns, whatever happened.
    pub async fn initialize(&self) -> SessionState {
        let this = self.clone();
        let settled = detached(async move {
            let mut vault = this.shared.vault.lock().await;
            let pending = this.shared.state.borrow().stage == InitStage::Pending;
            if !pending {
                return this.state();
            }

            this.shared.state.send_modify(|s| s.stage = InitStage::Running);
            {
                let _loading = Loading::begin(&this.shared);
                this.hydrate(&mut vault).await;
                this.shared.state.send_modify(|s| s.stage = InitStage::Done);
            }

            let state = this.state();
            tracing::info!(phase = ?state.phase(), "session initialized");
            state
        })
        .await;
        settled.unwrap_or_else(|| self.state())
    }

    /// Sign in with email and password.
    ///
    /// Nothing is committed unless both token issuance and the profile fetch
    /// succeed.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let mut vault = self
            .shared
            .vault
            .clone()
            .try_lock_owned()
            .map_err(|_| SessionError::busy())?;

        let this = self.clone();
        let email = email.to_string();
        let password = password.to_string();
        detached(async move {
            let result = {
                let _loading = Loading::begin(&this.shared);
                this.login_locked(&mut vault, &email, &password).await
            };
            if let Ok(ref user) = result {
                this.shared.events.notify(SessionEvent::LoggedIn(user.id.clone()));
            }
            result
        })
        .await
        .unwrap_or_else(|| Err(SessionError::aborted()))
    }

    /// Create an account and sign in as it.
    pub async fn register(
        &self,
        email: &str,
        display_name: &str,
        password: &str,
    ) -> Result<User, SessionError> {
        let mut vault = self
            .shared
            .vault
            .clone()
            .try_lock_owned()
            .map_err(|_| SessionError::busy())?;

        let this = self.clone();
        let request = RegisterRequest {
            email: email.to_string(),
            display_name: display_name.to_string(),
            password: password.to_string(),
        };
        detached(async move {
            let result = {
                let _loading = Loading::begin(&this.shared);
                this.register_locked(&mut vault, request).await
            };
            if let Ok(ref user) = result {
                this.shared.events.notify(SessionEvent::Registered(user.id.clone()));
            }
            result
        })
        .await
        .unwrap_or_else(|| Err(SessionError::aborted()))
    }

    /// Sign out. The server is told when possible; the local session is
    /// cleared regardless.
    pub async fn logout(&self) {
        let this = self.clone();
        detached(async move {
            let mut vault = this.shared.vault.lock().await;
            let access_token = this.shared.state.borrow().access_token.clone();

            if let (Some(access), Some(refresh)) = (access_token, vault.refresh_token.clone()) {
                if let Err(e) = this.shared.identity.logout(&access, &refresh).await {
                    tracing::warn!(error = %e, "logout notification failed, clearing local session anyway");
                }
            }

            this.wipe(&mut vault).await;
            tracing::info!("logged out");
            this.shared.events.notify(SessionEvent::LoggedOut);
        })
        .await;
    }

    /// Sign out on every device. Same clearing guarantees as [`logout`](Self::logout).
    pub async fn logout_all(&self) {
        let this = self.clone();
        detached(async move {
            let mut vault = this.shared.vault.lock().await;
            let access_token = this.shared.state.borrow().access_token.clone();

            if let Some(access) = access_token {
                if let Err(e) = this.shared.identity.logout_all(&access).await {
                    tracing::warn!(error = %e, "logout-all notification failed, clearing local session anyway");
                }
            }

            this.wipe(&mut vault).await;
            tracing::info!("logged out from all devices");
            this.shared.events.notify(SessionEvent::LoggedOut);
        })
        .await;
    }

    /// Replace the tokens using the refresh token.
    ///
    /// Returns `false` straight away when there is no refresh token. Any other
    /// failure clears the whole session, so this can sign the user out.
    pub async fn refresh(&self) -> bool {
        self.try_refresh().await.is_ok()
    }

    /// [`refresh`](Self::refresh) with a typed error for callers that need one.
    pub async fn try_refresh(&self) -> Result<(), SessionError> {
        let seen = self.shared.refresh_epoch.load(Ordering::SeqCst);
        let this = self.clone();
        detached(async move {
            let mut vault = this.shared.vault.lock().await;

            // Reuse the outcome only when that refresh is the one change since
            // this call started.
            let now = this.shared.refresh_epoch.load(Ordering::SeqCst);
            if now == seen + 1 {
                if let Some((at, ok)) = vault.last_refresh {
                    if at == now {
                        tracing::debug!("joining refresh that completed while waiting");
                        return if ok { Ok(()) } else { Err(SessionError::expired()) };
                    }
                }
            }

            if this.refresh_locked(&mut vault).await {
                Ok(())
            } else {
                Err(SessionError::expired())
            }
        })
        .await
        .unwrap_or_else(|| Err(SessionError::aborted()))
    }

    /// Update the signed-in user's profile.
    ///
    /// An expired access token gets one refresh and one retry. If the updated
    /// profile cannot be persisted the session is cleared.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<User, SessionError> {
        let mut vault = self
            .shared
            .vault
            .clone()
            .try_lock_owned()
            .map_err(|_| SessionError::busy())?;

        let this = self.clone();
        detached(async move { this.update_profile_locked(&mut vault, update).await })
            .await
            .unwrap_or_else(|| Err(SessionError::aborted()))
    }

    // ─── Internals (operation lock held) ────────────────────────────

    async fn update_profile_locked(
        &self,
        vault: &mut Vault,
        update: ProfileUpdate,
    ) -> Result<User, SessionError> {
        let access = self.authenticated_token()?;
        let user = match self.shared.identity.update_profile(&access, &update).await {
            Ok(user) => user,
            Err(e) if e.is_unauthorized() => {
                tracing::debug!("access token rejected, refreshing before retry");
                if !self.refresh_or_expire(vault).await {
                    return Err(SessionError::expired());
                }
                let access = self.authenticated_token()?;
                self.shared
                    .identity
                    .update_profile(&access, &update)
                    .await
                    .map_err(SessionError::from_profile_update)?
            }
            Err(e) => return Err(SessionError::from_profile_update(e)),
        };

        if let Err(e) = self.persist_user(&user).await {
            tracing::warn!(error = %e, "could not persist updated profile, clearing");
            self.expire(vault).await;
            return Err(SessionError::storage(e));
        }

        self.shared.state.send_modify(|s| s.user = Some(user.clone()));
        self.shared.events.notify(SessionEvent::ProfileUpdated);
        Ok(user)
    }

    async fn login_locked(
        &self,
        vault: &mut Vault,
        email: &str,
        password: &str,
    ) -> Result<User, SessionError> {
        tracing::debug!(%email, "logging in");
        let identity = &self.shared.identity;

        let tokens = identity
            .issue_token(email, password)
            .await
            .map_err(SessionError::from_login)?;

        let user = match identity.fetch_profile(&tokens.access_token).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, "profile fetch failed after token issuance, discarding tokens");
                if let Some(ref refresh) = tokens.refresh_token {
                    if let Err(e) = identity.logout(&tokens.access_token, refresh).await {
                        tracing::debug!(error = %e, "could not revoke discarded tokens");
                    }
                }
                return Err(SessionError::from_profile_fetch(e));
            }
        };

        self.commit(vault, user.clone(), tokens.access_token, tokens.refresh_token)
            .await?;
        tracing::info!(user_id = %user.id, "logged in");
        Ok(user)
    }

    async fn register_locked(
        &self,
        vault: &mut Vault,
        request: RegisterRequest,
    ) -> Result<User, SessionError> {
        tracing::debug!(email = %request.email, "registering");
        let registered = self
            .shared
            .identity
            .register(&request)
            .await
            .map_err(SessionError::from_register)?;

        let user = registered.user;
        self.commit(
            vault,
            user.clone(),
            registered.access_token,
            registered.refresh_token,
        )
        .await?;
        tracing::info!(user_id = %user.id, "registered");
        Ok(user)
    }

    async fn hydrate(&self, vault: &mut Vault) {
        let persisted = match self.read_persisted().await {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                tracing::debug!("no persisted session");
                return;
            }
            Err(reason) => {
                tracing::warn!(%reason, "discarding malformed persisted session");
                self.wipe(vault).await;
                return;
            }
        };

        vault.refresh_token = persisted.refresh_token;
        self.shared.state.send_modify(|s| {
            s.user = Some(persisted.user);
            s.access_token = Some(persisted.access_token);
        });

        if !self.refresh_or_expire(vault).await {
            tracing::info!("persisted session is no longer valid");
        }
    }

    async fn read_persisted(&self) -> Result<Option<Persisted>, String> {
        let store = &self.shared.store;
        let access = store.get(keys::ACCESS_TOKEN).await.map_err(|e| e.to_string())?;
        let refresh = store.get(keys::REFRESH_TOKEN).await.map_err(|e| e.to_string())?;
        let user = store.get(keys::USER).await.map_err(|e| e.to_string())?;

        match (access, user) {
            (None, None) if refresh.is_none() => Ok(None),
            (Some(access_token), Some(raw)) => {
                let user: User = serde_json::from_str(&raw)
                    .map_err(|e| format!("stored user is not valid: {}", e))?;
                Ok(Some(Persisted {
                    user,
                    access_token,
                    refresh_token: refresh,
                }))
            }
            _ => Err("incomplete persisted session".to_string()),
        }
    }

    /// Refresh; returns whether it succeeded. On failure the session is cleared
    /// by the time this returns, unless there was no refresh token to try.
    async fn refresh_locked(&self, vault: &mut Vault) -> bool {
        let Some(refresh_token) = vault.refresh_token.clone() else {
            tracing::debug!("no refresh token, skipping refresh");
            return false;
        };

        let _loading = Loading::begin(&self.shared);
        let ok = match self.shared.identity.refresh(&refresh_token).await {
            Ok(tokens) => {
                let refresh = tokens.refresh_token.unwrap_or(refresh_token);
                match self.persist_tokens(&tokens.access_token, &refresh).await {
                    Ok(()) => {
                        vault.refresh_token = Some(refresh);
                        self.shared
                            .state
                            .send_modify(|s| s.access_token = Some(tokens.access_token));
                        true
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "could not persist refreshed tokens");
                        false
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "token refresh failed");
                false
            }
        };

        if ok {
            tracing::debug!("tokens refreshed");
            let epoch = self.bump_epoch();
            vault.last_refresh = Some((epoch, true));
            self.shared.events.notify(SessionEvent::Refreshed);
        } else {
            // The wipe is this refresh's one epoch bump.
            self.expire(vault).await;
            let epoch = self.shared.refresh_epoch.load(Ordering::SeqCst);
            vault.last_refresh = Some((epoch, false));
        }
        ok
    }

    /// Refresh, and if that was impossible, drop whatever credentials remain.
    async fn refresh_or_expire(&self, vault: &mut Vault) -> bool {
        if self.refresh_locked(vault).await {
            return true;
        }
        if self.has_credentials(vault) {
            self.expire(vault).await;
        }
        false
    }

    async fn commit(
        &self,
        vault: &mut Vault,
        user: User,
        access_token: String,
        refresh_token: Option<String>,
    ) -> Result<(), SessionError> {
        if let Err(e) = self
            .persist_session(&user, &access_token, refresh_token.as_deref())
            .await
        {
            tracing::warn!(error = %e, "could not persist session, clearing");
            self.wipe(vault).await;
            return Err(SessionError::storage(e));
        }

        vault.refresh_token = refresh_token;
        self.bump_epoch();
        self.shared.state.send_modify(|s| {
            s.user = Some(user);
            s.access_token = Some(access_token);
        });
        Ok(())
    }

    async fn persist_session(
        &self,
        user: &User,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), StoreError> {
        let store = &self.shared.store;
        let json =
            serde_json::to_string(user).map_err(|e| StoreError::OperationFailed(e.to_string()))?;

        // A new session must not inherit a token that no longer matches it.
        store.remove(keys::ACCESS_TOKEN).await?;
        store.set(keys::USER, &json).await?;
        match refresh_token {
            Some(refresh) => store.set(keys::REFRESH_TOKEN, refresh).await?,
            None => store.remove(keys::REFRESH_TOKEN).await?,
        }
        store.set(keys::ACCESS_TOKEN, access_token).await
    }

    async fn persist_user(&self, user: &User) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(user).map_err(|e| StoreError::OperationFailed(e.to_string()))?;
        self.shared.store.set(keys::USER, &json).await
    }

    async fn persist_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), StoreError> {
        let store = &self.shared.store;
        store.set(keys::REFRESH_TOKEN, refresh_token).await?;
        store.set(keys::ACCESS_TOKEN, access_token).await
    }

    /// Clear memory and store. Store failures are logged, never returned.
    async fn wipe(&self, vault: &mut Vault) {
        vault.refresh_token = None;
        self.bump_epoch();
        self.shared.state.send_modify(SessionState::clear_credentials);
        if let Err(e) = self.shared.store.clear().await {
            tracing::warn!(error = %e, "could not clear persisted session");
        }
    }

    async fn expire(&self, vault: &mut Vault) {
        self.wipe(vault).await;
        self.shared.events.notify(SessionEvent::Expired);
    }

    fn has_credentials(&self, vault: &Vault) -> bool {
        let state = self.shared.state.borrow();
        vault.refresh_token.is_some() || state.access_token.is_some() || state.user.is_some()
    }

    fn authenticated_token(&self) -> Result<String, SessionError> {
        let state = self.shared.state.borrow();
        match (&state.user, &state.access_token) {
            (Some(_), Some(token)) => Ok(token.clone()),
            _ => Err(SessionError::expired()),
        }
    }

    /// Advance the refresh epoch; returns the new value.
    fn bump_epoch(&self) -> u64 {
        self.shared.refresh_epoch.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &*self.shared.state.borrow())
            .field("identity", &self.shared.identity)
            .field("store", &self.shared.store)
            .finish()
    }
}
