//! Session change notifications.
//!
//! Observers get two feeds from the manager:
//! - the current [`SessionState`](crate::SessionState) through a
//!   `tokio::sync::watch` channel (latest value wins, good for rendering);
//! - discrete [`SessionEvent`]s through [`SessionBroadcast`] (every event is
//!   delivered, good for navigation).

use tokio::sync::broadcast;

/// Default capacity of the event channel. Slow receivers that fall further
/// behind than this see `RecvError::Lagged`.
const EVENT_CAPACITY: usize = 32;

/// Path callers land on after signing in.
pub const HOME_ROUTE: &str = "/";
/// Path callers are sent to when no session is available.
pub const LOGIN_ROUTE: &str = "/login";

/// Something that happened to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Login succeeded. Carries the user id.
    LoggedIn(String),
    /// Registration succeeded. Carries the user id.
    Registered(String),
    /// Tokens were replaced by a successful refresh.
    Refreshed,
    /// The profile was updated on the server.
    ProfileUpdated,
    /// The user logged out (locally, server notification best-effort).
    LoggedOut,
    /// Credentials were found invalid and the session was cleared.
    Expired,
}

impl SessionEvent {
    /// Where a UI should navigate in response to this event, if anywhere.
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            Self::LoggedIn(_) | Self::Registered(_) => Some(HOME_ROUTE),
            Self::LoggedOut | Self::Expired => Some(LOGIN_ROUTE),
            Self::Refreshed | Self::ProfileUpdated => None,
        }
    }
}

/// Fan-out of [`SessionEvent`]s to any number of subscribers.
#[derive(Clone)]
pub struct SessionBroadcast {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionBroadcast {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn notify(&self, event: SessionEvent) {
        tracing::debug!(?event, "session event");
        let _ = self.sender.send(event);
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for SessionBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionBroadcast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBroadcast")
            .field("receivers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirects() {
        assert_eq!(SessionEvent::LoggedIn("1".into()).redirect(), Some("/"));
        assert_eq!(SessionEvent::Registered("1".into()).redirect(), Some("/"));
        assert_eq!(SessionEvent::LoggedOut.redirect(), Some("/login"));
        assert_eq!(SessionEvent::Expired.redirect(), Some("/login"));
        assert_eq!(SessionEvent::Refreshed.redirect(), None);
        assert_eq!(SessionEvent::ProfileUpdated.redirect(), None);
    }

    #[tokio::test]
    async fn test_session_broadcast() {
        let broadcast = SessionBroadcast::new();
        let mut rx = broadcast.subscribe();

        broadcast.notify(SessionEvent::LoggedIn("u1".into()));
        broadcast.notify(SessionEvent::LoggedOut);

        assert_eq!(rx.recv().await.unwrap(), SessionEvent::LoggedIn("u1".into()));
        assert_eq!(rx.recv().await.unwrap(), SessionEvent::LoggedOut);
    }

    #[test]
    fn test_notify_without_subscribers() {
        let broadcast = SessionBroadcast::default();
        broadcast.notify(SessionEvent::Refreshed);
        assert!(format!("{:?}", broadcast).contains("receivers"));
    }
}
