//! Event loop binding a router to its identity provider's session feed.
//!
//! One task owns the subscription and every in-flight lookup. It keeps
//! listening for session events while lookups are pending, so a newer
//! event is observed (and bumps the router's generation) before an older
//! lookup's result is applied.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use shared::{ProfileRecord, RoutingDecision};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::{RouterError, StoreError};
use crate::identity::SessionSubscription;
use crate::router::{AuthRouter, LookupTicket, Resolution};

/// Snapshot published after every state change the driver applies
#[derive(Debug, Clone, PartialEq)]
pub struct RouteUpdate {
    pub decision: RoutingDecision,
    /// Set when the change was caused by a failure the user should see
    pub error: Option<RouterError>,
    pub generation: u64,
}

impl RouteUpdate {
    fn from_router(router: &AuthRouter, error: Option<RouterError>) -> Self {
        let (decision, generation) = router.snapshot();
        Self {
            decision,
            error,
            generation,
        }
    }
}

type Lookup = BoxFuture<'static, (LookupTicket, Result<Option<ProfileRecord>, StoreError>)>;

pub struct RouterDriver {
    updates: watch::Receiver<RouteUpdate>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RouterDriver {
    /// Subscribe to the router's identity provider and start processing
    /// session events. Must be called inside a tokio runtime.
    pub fn spawn(router: Arc<AuthRouter>) -> Self {
        let subscription = router.identity().subscribe();
        let (tx, rx) = watch::channel(RouteUpdate::from_router(&router, None));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(router, subscription, tx, shutdown_rx));

        Self {
            updates: rx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RouteUpdate> {
        self.updates.clone()
    }

    pub fn latest(&self) -> RouteUpdate {
        self.updates.borrow().clone()
    }

    /// First non-loading update newer than `generation`.
    ///
    /// Returns `None` if the driver stopped before one arrived.
    pub async fn settled_after(&mut self, generation: u64) -> Option<RouteUpdate> {
        self.updates
            .wait_for(|u| u.generation > generation && !u.decision.is_loading())
            .await
            .ok()
            .map(|u| u.clone())
    }

    /// Stop processing events and drop the subscription. No event arriving
    /// after this call is acted on.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Router driver task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for RouterDriver {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn run(
    router: Arc<AuthRouter>,
    mut subscription: SessionSubscription,
    tx: watch::Sender<RouteUpdate>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut inflight: FuturesUnordered<Lookup> = FuturesUnordered::new();

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,

            event = subscription.recv() => {
                let Some(session) = event else {
                    tracing::debug!("Session feed closed");
                    break;
                };
                if let Some(ticket) = router.observe(session) {
                    let router = Arc::clone(&router);
                    inflight.push(Box::pin(async move {
                        let lookup = router.fetch(&ticket).await;
                        (ticket, lookup)
                    }));
                }
                tx.send_replace(RouteUpdate::from_router(&router, None));
            }

            Some((ticket, lookup)) = inflight.next(), if !inflight.is_empty() => {
                match router.complete(ticket, lookup) {
                    Ok(Resolution::Decided(_)) => {
                        tx.send_replace(RouteUpdate::from_router(&router, None));
                    }
                    Ok(Resolution::Superseded) => {}
                    Err(e) => {
                        tx.send_replace(RouteUpdate::from_router(&router, Some(e)));
                    }
                }
            }
        }
    }

    subscription.unsubscribe();
    tracing::debug!("Router driver stopped");
}
