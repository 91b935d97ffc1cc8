//! Identity provider seam and the session broadcaster adapters build on.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::{FederatedProvider, Session};
use tokio::sync::mpsc;

use crate::error::IdentityError;

/// Authentication backend consumed by the onboarding router.
///
/// Every successful call that changes who is signed in must also publish
/// the new session to subscribers.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, secret: &str)
        -> Result<Session, IdentityError>;

    async fn sign_up_with_password(&self, email: &str, secret: &str)
        -> Result<Session, IdentityError>;

    async fn sign_in_federated(&self, provider: FederatedProvider)
        -> Result<Session, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Re-issue the current session and publish it again, so views
    /// depending on fresh claims re-run their routing.
    async fn refresh_session(&self) -> Result<Session, IdentityError>;

    fn current_session(&self) -> Session;

    /// The current session is delivered immediately after subscribing.
    fn subscribe(&self) -> SessionSubscription;
}

struct FeedState {
    current: Session,
    next_id: u64,
    subscribers: HashMap<u64, mpsc::UnboundedSender<Session>>,
}

/// Fan-out of session-changed events.
///
/// Publishing and subscribing happen under one lock, so every subscriber
/// observes the same event order.
#[derive(Clone)]
pub struct SessionFeed {
    inner: Arc<Mutex<FeedState>>,
}

impl SessionFeed {
    pub fn new() -> Self {
        Self::with_session(Session::signed_out())
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FeedState {
                current: session,
                next_id: 0,
                subscribers: HashMap::new(),
            })),
        }
    }

    pub fn current(&self) -> Session {
        self.inner.lock().current.clone()
    }

    pub fn publish(&self, session: Session) {
        let mut state = self.inner.lock();
        state.current = session.clone();
        state
            .subscribers
            .retain(|_, tx| tx.send(session.clone()).is_ok());
        tracing::debug!(
            "Session published (authenticated: {}, subscribers: {})",
            session.is_authenticated(),
            state.subscribers.len()
        );
    }

    pub fn subscribe(&self) -> SessionSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.lock();
        let id = state.next_id;
        state.next_id += 1;
        // Receiver is alive, the send cannot fail
        let _ = tx.send(state.current.clone());
        state.subscribers.insert(id, tx);

        SessionSubscription {
            id,
            rx,
            feed: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

impl Default for SessionFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a session-changed subscription. Dropping it unsubscribes.
pub struct SessionSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<Session>,
    feed: Weak<Mutex<FeedState>>,
}

impl SessionSubscription {
    /// Next session event in arrival order; `None` once the feed is gone.
    pub async fn recv(&mut self) -> Option<Session> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Session> {
        self.rx.try_recv().ok()
    }

    pub fn unsubscribe(self) {
        // Drop does the work
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        if let Some(feed) = self.feed.upgrade() {
            feed.lock().subscribers.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Principal;

    fn session(id: &str) -> Session {
        Session::authenticated(Principal {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            federated: None,
        })
    }

    #[tokio::test]
    async fn subscriber_receives_current_then_updates_in_order() {
        let feed = SessionFeed::new();
        let mut sub = feed.subscribe();

        feed.publish(session("a"));
        feed.publish(session("b"));
        feed.publish(Session::signed_out());

        assert_eq!(sub.recv().await, Some(Session::signed_out()));
        assert_eq!(sub.recv().await.unwrap().principal_id(), Some("a"));
        assert_eq!(sub.recv().await.unwrap().principal_id(), Some("b"));
        assert_eq!(sub.recv().await, Some(Session::signed_out()));
    }

    #[test]
    fn unsubscribe_detaches() {
        let feed = SessionFeed::new();
        let sub = feed.subscribe();
        let other = feed.subscribe();
        assert_eq!(feed.subscriber_count(), 2);

        sub.unsubscribe();
        assert_eq!(feed.subscriber_count(), 1);
        drop(other);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn late_subscriber_sees_latest_session() {
        let feed = SessionFeed::new();
        feed.publish(session("a"));
        let mut sub = feed.subscribe();
        assert_eq!(sub.try_recv().unwrap().principal_id(), Some("a"));
        assert!(sub.try_recv().is_none());
    }
}
