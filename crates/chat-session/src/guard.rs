//! Route guarding for protected screens.
//!
//! Protected content waits while the session is loading, and sends the user
//! to the login screen once the session has settled unauthenticated.

use tokio::sync::watch;

use crate::session::LOGIN_ROUTE;
use crate::types::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Still initializing or an operation is in flight; show a spinner.
    Pending,
    /// Authenticated; render the protected content.
    Allow,
    /// Settled and anonymous; navigate to the login screen.
    RedirectToLogin,
}

impl RouteDecision {
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            Self::RedirectToLogin => Some(LOGIN_ROUTE),
            _ => None,
        }
    }
}

/// Decide what a protected route should do for `state`.
pub fn guard(state: &SessionState) -> RouteDecision {
    if !state.is_initialized() || state.is_loading {
        RouteDecision::Pending
    } else if state.is_authenticated() {
        RouteDecision::Allow
    } else {
        RouteDecision::RedirectToLogin
    }
}

/// Wait until the guard reaches a settled decision.
///
/// Returns [`RouteDecision::RedirectToLogin`] if the manager is dropped first.
pub async fn wait_for_decision(mut rx: watch::Receiver<SessionState>) -> RouteDecision {
    loop {
        let decision = guard(&rx.borrow_and_update());
        if decision != RouteDecision::Pending {
            return decision;
        }
        if rx.changed().await.is_err() {
            return RouteDecision::RedirectToLogin;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{InitStage, User};

    fn settled(authenticated: bool) -> SessionState {
        let mut state = SessionState::new();
        state.stage = InitStage::Done;
        state.is_loading = false;
        if authenticated {
            state.access_token = Some("T".into());
            state.user = Some(User {
                id: "1".into(),
                email: "a@b.com".into(),
                display_name: "A".into(),
                profile_image_url: None,
                created_at: None,
                updated_at: None,
            });
        }
        state
    }

    #[test]
    fn test_guard_pending_before_initialize() {
        assert_eq!(guard(&SessionState::new()), RouteDecision::Pending);
    }

    #[test]
    fn test_guard_pending_while_loading() {
        let mut state = settled(true);
        state.is_loading = true;
        assert_eq!(guard(&state), RouteDecision::Pending);
    }

    #[test]
    fn test_guard_settled() {
        assert_eq!(guard(&settled(true)), RouteDecision::Allow);
        let decision = guard(&settled(false));
        assert_eq!(decision, RouteDecision::RedirectToLogin);
        assert_eq!(decision.redirect(), Some("/login"));
        assert_eq!(RouteDecision::Allow.redirect(), None);
    }

    #[tokio::test]
    async fn test_wait_for_decision() {
        let (tx, rx) = watch::channel(SessionState::new());
        let waiter = tokio::spawn(wait_for_decision(rx));

        tx.send_modify(|s| s.stage = InitStage::Running);
        tx.send_replace(settled(true));

        assert_eq!(waiter.await.unwrap(), RouteDecision::Allow);
    }

    #[tokio::test]
    async fn test_wait_for_decision_sender_dropped() {
        let (tx, rx) = watch::channel(SessionState::new());
        drop(tx);
        assert_eq!(wait_for_decision(rx).await, RouteDecision::RedirectToLogin);
    }
}
