//! Onboarding/auth router: decides which screen a session lands on and
//! writes the role chosen during onboarding.
//!
//! Session events and profile lookups interleave: a lookup is issued for
//! one session, and a newer session may arrive before it completes. Each
//! observed session bumps a generation counter; a lookup result tagged with
//! an older generation is discarded.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use shared::{PendingIdentity, ProfileRecord, Role, RoutingDecision, Session};

use crate::error::{RouterError, StoreError};
use crate::identity::IdentityProvider;
use crate::store::ProfileStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterState {
    /// No session event received yet
    Unresolved,
    Unauthenticated,
    /// Session present, profile lookup in flight
    Resolving { pending: PendingIdentity },
    /// Profile missing, or present without a role
    NeedsRole { pending: PendingIdentity },
    Routed { principal_id: String, role: Role },
}

impl RouterState {
    pub fn decision(&self) -> RoutingDecision {
        match self {
            RouterState::Unresolved | RouterState::Resolving { .. } => {
                RoutingDecision::ShowLoadingIndicator
            }
            RouterState::Unauthenticated => RoutingDecision::ShowAuth,
            RouterState::NeedsRole { pending } => RoutingDecision::ShowRoleSelection {
                pending: pending.clone(),
            },
            RouterState::Routed { role, .. } => RoutingDecision::dashboard(*role),
        }
    }
}

/// Proof that a profile lookup was started for a particular session event
#[derive(Debug, Clone)]
pub struct LookupTicket {
    generation: u64,
    pending: PendingIdentity,
}

impl LookupTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn principal_id(&self) -> &str {
        &self.pending.principal_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Decided(RoutingDecision),
    /// A newer session event arrived first; this result was not applied
    Superseded,
}

struct RouterInner {
    state: RouterState,
    generation: u64,
    session: Session,
}

pub struct AuthRouter {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    inner: Mutex<RouterInner>,
}

impl AuthRouter {
    pub fn new(identity: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            identity,
            profiles,
            inner: Mutex::new(RouterInner {
                state: RouterState::Unresolved,
                generation: 0,
                session: Session::signed_out(),
            }),
        }
    }

    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    pub fn state(&self) -> RouterState {
        self.inner.lock().state.clone()
    }

    pub fn decision(&self) -> RoutingDecision {
        self.inner.lock().state.decision()
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Decision and generation read under one lock
    pub fn snapshot(&self) -> (RoutingDecision, u64) {
        let inner = self.inner.lock();
        (inner.state.decision(), inner.generation)
    }

    /// Most recent session snapshot the router has seen
    pub fn session(&self) -> Session {
        self.inner.lock().session.clone()
    }

    /// Record a session-changed event.
    ///
    /// Sign-out is applied immediately. A present session moves the router
    /// to `Resolving` and returns the ticket to look its profile up with.
    pub fn observe(&self, session: Session) -> Option<LookupTicket> {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        let generation = inner.generation;

        let ticket = match &session.principal {
            None => {
                inner.state = RouterState::Unauthenticated;
                None
            }
            Some(principal) => {
                let pending = PendingIdentity::from(principal);
                inner.state = RouterState::Resolving {
                    pending: pending.clone(),
                };
                Some(LookupTicket {
                    generation,
                    pending,
                })
            }
        };
        inner.session = session;

        tracing::debug!(
            generation,
            state = ?inner.state,
            "Router observed session change"
        );
        ticket
    }

    /// The suspension point: profile lookup for a ticket.
    pub async fn fetch(&self, ticket: &LookupTicket) -> Result<Option<ProfileRecord>, StoreError> {
        self.profiles.get(ticket.principal_id()).await
    }

    /// Apply a lookup result, unless a newer session has been observed.
    pub fn complete(
        &self,
        ticket: LookupTicket,
        lookup: Result<Option<ProfileRecord>, StoreError>,
    ) -> Result<Resolution, RouterError> {
        let mut inner = self.inner.lock();
        if inner.generation != ticket.generation {
            tracing::debug!(
                stale = ticket.generation,
                current = inner.generation,
                "Discarding profile lookup for {}",
                ticket.principal_id()
            );
            return Ok(Resolution::Superseded);
        }

        let generation = ticket.generation;
        let next = match lookup {
            Ok(Some(ProfileRecord {
                role: Some(role), ..
            })) => RouterState::Routed {
                principal_id: ticket.pending.principal_id,
                role,
            },
            Ok(_) => RouterState::NeedsRole {
                pending: ticket.pending,
            },
            Err(e) => {
                tracing::warn!("Profile lookup for {} failed: {}", ticket.principal_id(), e);
                inner.state = RouterState::Unauthenticated;
                return Err(RouterError::TransientLookupFailure(e));
            }
        };
        inner.state = next;

        tracing::debug!(generation, state = ?inner.state, "Router resolved");
        Ok(Resolution::Decided(inner.state.decision()))
    }

    /// Observe a session and, if needed, look its profile up.
    pub async fn resolve(&self, session: Session) -> Result<Resolution, RouterError> {
        match self.observe(session) {
            None => Ok(Resolution::Decided(RoutingDecision::ShowAuth)),
            Some(ticket) => {
                let lookup = self.fetch(&ticket).await;
                self.complete(ticket, lookup)
            }
        }
    }

    /// Persist the role picked on the role-selection screen.
    ///
    /// Re-issuing the same commit is safe: after a failed write the state is
    /// still `NeedsRole` and the record is written again under the same id;
    /// after a successful one the call returns the dashboard without writing.
    pub async fn commit_role(
        &self,
        pending: &PendingIdentity,
        role: Role,
    ) -> Result<RoutingDecision, RouterError> {
        let generation = {
            let inner = self.inner.lock();
            let live = inner.session.principal_id();
            if live != Some(pending.principal_id.as_str()) {
                return Err(RouterError::StaleIdentity {
                    expected: pending.principal_id.clone(),
                    actual: live.map(str::to_string),
                });
            }

            match &inner.state {
                RouterState::NeedsRole { pending: waiting }
                    if waiting.principal_id == pending.principal_id => {}
                RouterState::Routed {
                    principal_id,
                    role: current,
                } if *principal_id == pending.principal_id => {
                    if *current == role {
                        return Ok(RoutingDecision::dashboard(role));
                    }
                    return Err(RouterError::RoleAlreadySet { role: *current });
                }
                _ => return Err(RouterError::NotAwaitingRole),
            }
            inner.generation
        };

        let record = ProfileRecord::for_role(pending, role, Utc::now());
        self.profiles
            .create(&pending.principal_id, &record)
            .await
            .map_err(|e| {
                tracing::warn!("Saving role for {} failed: {}", pending.principal_id, e);
                RouterError::PersistenceFailure(e)
            })?;

        {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return Err(RouterError::Superseded);
            }
            inner.state = RouterState::Routed {
                principal_id: pending.principal_id.clone(),
                role,
            };
        }
        tracing::info!("Role {} committed for {}", role, pending.principal_id);

        // Re-emits the session so subscribers resolve against the new record
        if let Err(e) = self.identity.refresh_session().await {
            tracing::warn!("Session refresh after role commit failed: {}", e);
        }

        Ok(RoutingDecision::dashboard(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryIdentityProvider, MemoryProfileStore};
    use shared::{FederatedHints, Principal};

    fn principal(id: &str) -> Principal {
        Principal {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            federated: None,
        }
    }

    fn setup() -> (Arc<MemoryIdentityProvider>, Arc<MemoryProfileStore>, AuthRouter) {
        let identity = Arc::new(MemoryIdentityProvider::new());
        let profiles = Arc::new(MemoryProfileStore::new());
        let router = AuthRouter::new(identity.clone(), profiles.clone());
        (identity, profiles, router)
    }

    fn record(id: &str, role: Option<Role>) -> ProfileRecord {
        let pending = PendingIdentity::from(&principal(id));
        let mut record = ProfileRecord::for_role(&pending, Role::Client, Utc::now());
        record.role = role;
        record
    }

    #[test]
    fn starts_unresolved_and_loading() {
        let (_, _, router) = setup();
        assert_eq!(router.state(), RouterState::Unresolved);
        assert_eq!(router.decision(), RoutingDecision::ShowLoadingIndicator);
    }

    #[tokio::test]
    async fn signed_out_session_shows_auth_from_any_state() {
        let (_, profiles, router) = setup();
        profiles.insert(record("a", Some(Role::Freelancer)));

        let first = router.resolve(Session::signed_out()).await.unwrap();
        assert_eq!(first, Resolution::Decided(RoutingDecision::ShowAuth));

        router
            .resolve(Session::authenticated(principal("a")))
            .await
            .unwrap();
        assert!(matches!(router.state(), RouterState::Routed { .. }));

        let after = router.resolve(Session::signed_out()).await.unwrap();
        assert_eq!(after, Resolution::Decided(RoutingDecision::ShowAuth));
        assert_eq!(router.state(), RouterState::Unauthenticated);
    }

    #[tokio::test]
    async fn missing_profile_needs_role_with_pending_identity() {
        let (_, _, router) = setup();
        let mut p = principal("new");
        p.federated = Some(FederatedHints {
            display_name: Some("New Person".to_string()),
            avatar_url: None,
        });

        let resolution = router.resolve(Session::authenticated(p)).await.unwrap();
        let Resolution::Decided(RoutingDecision::ShowRoleSelection { pending }) = resolution else {
            panic!("expected role selection, got {:?}", resolution);
        };
        assert_eq!(pending.principal_id, "new");
        assert_eq!(pending.email, "new@example.com");
        assert_eq!(
            pending.federated.and_then(|h| h.display_name).as_deref(),
            Some("New Person")
        );
    }

    #[tokio::test]
    async fn profile_without_role_needs_role() {
        let (_, profiles, router) = setup();
        profiles.insert(record("half", None));

        let resolution = router
            .resolve(Session::authenticated(principal("half")))
            .await
            .unwrap();
        assert!(matches!(
            resolution,
            Resolution::Decided(RoutingDecision::ShowRoleSelection { .. })
        ));
    }

    #[tokio::test]
    async fn profile_role_picks_matching_dashboard() {
        let (_, profiles, router) = setup();
        profiles.insert(record("f", Some(Role::Freelancer)));
        profiles.insert(record("c", Some(Role::Client)));

        let f = router
            .resolve(Session::authenticated(principal("f")))
            .await
            .unwrap();
        assert_eq!(
            f,
            Resolution::Decided(RoutingDecision::ShowFreelancerDashboard)
        );

        let c = router
            .resolve(Session::authenticated(principal("c")))
            .await
            .unwrap();
        assert_eq!(c, Resolution::Decided(RoutingDecision::ShowClientDashboard));
    }

    #[tokio::test]
    async fn lookup_failure_reverts_to_unauthenticated() {
        let (_, profiles, router) = setup();
        profiles.fail_next_get(StoreError::Unavailable("offline".to_string()));

        let err = router
            .resolve(Session::authenticated(principal("a")))
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::TransientLookupFailure(_)));
        assert!(err.to_string().starts_with("Error verifying user account"));
        assert_eq!(router.state(), RouterState::Unauthenticated);

        // A fresh session event re-enters resolution
        let retry = router
            .resolve(Session::authenticated(principal("a")))
            .await
            .unwrap();
        assert!(matches!(
            retry,
            Resolution::Decided(RoutingDecision::ShowRoleSelection { .. })
        ));
    }

    #[tokio::test]
    async fn stale_lookup_result_is_discarded() {
        let (_, profiles, router) = setup();
        profiles.insert(record("b", Some(Role::Client)));

        let ticket_a = router.observe(Session::authenticated(principal("a"))).unwrap();
        let ticket_b = router.observe(Session::authenticated(principal("b"))).unwrap();

        let lookup_b = router.fetch(&ticket_b).await;
        assert_eq!(
            router.complete(ticket_b, lookup_b).unwrap(),
            Resolution::Decided(RoutingDecision::ShowClientDashboard)
        );

        // A's result lands late and must not overwrite B's decision
        let lookup_a = Ok(Some(record("a", Some(Role::Freelancer))));
        assert_eq!(
            router.complete(ticket_a, lookup_a).unwrap(),
            Resolution::Superseded
        );
        assert_eq!(router.decision(), RoutingDecision::ShowClientDashboard);
    }

    #[tokio::test]
    async fn sign_out_preempts_in_flight_lookup() {
        let (_, _, router) = setup();
        let ticket = router.observe(Session::authenticated(principal("a"))).unwrap();
        router.observe(Session::signed_out());

        let failed = Err(StoreError::Unavailable("late".to_string()));
        assert_eq!(router.complete(ticket, failed).unwrap(), Resolution::Superseded);
        assert_eq!(router.decision(), RoutingDecision::ShowAuth);
    }

    #[tokio::test]
    async fn commit_role_writes_defaults_and_routes() {
        let (identity, profiles, router) = setup();
        let session = Session::authenticated(principal("a"));
        identity.set_session(session.clone());
        router.resolve(session).await.unwrap();
        let pending = router.decision().pending_identity().cloned().unwrap();

        let decision = router.commit_role(&pending, Role::Freelancer).await.unwrap();
        assert_eq!(decision, RoutingDecision::ShowFreelancerDashboard);

        let stored = profiles.snapshot("a").unwrap();
        assert_eq!(stored.role, Some(Role::Freelancer));
        assert_eq!(stored.title.as_deref(), Some("Freelancer"));
        assert_eq!(stored.hourly_rate, Some(25));
        assert_eq!(identity.refresh_count(), 1);
    }

    #[tokio::test]
    async fn commit_role_twice_writes_once() {
        let (identity, profiles, router) = setup();
        let session = Session::authenticated(principal("a"));
        identity.set_session(session.clone());
        router.resolve(session).await.unwrap();
        let pending = router.decision().pending_identity().cloned().unwrap();

        let first = router.commit_role(&pending, Role::Client).await.unwrap();
        let second = router.commit_role(&pending, Role::Client).await.unwrap();
        assert_eq!(first, RoutingDecision::ShowClientDashboard);
        assert_eq!(second, RoutingDecision::ShowClientDashboard);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles.create_count(), 1);
    }

    #[tokio::test]
    async fn commit_role_cannot_switch_roles() {
        let (identity, _, router) = setup();
        let session = Session::authenticated(principal("a"));
        identity.set_session(session.clone());
        router.resolve(session).await.unwrap();
        let pending = router.decision().pending_identity().cloned().unwrap();

        router.commit_role(&pending, Role::Client).await.unwrap();
        let err = router
            .commit_role(&pending, Role::Freelancer)
            .await
            .unwrap_err();
        assert_eq!(err, RouterError::RoleAlreadySet { role: Role::Client });
    }

    #[tokio::test]
    async fn commit_role_for_old_principal_is_rejected() {
        let (_, profiles, router) = setup();
        router
            .resolve(Session::authenticated(principal("a")))
            .await
            .unwrap();
        let pending_a = router.decision().pending_identity().cloned().unwrap();

        router
            .resolve(Session::authenticated(principal("b")))
            .await
            .unwrap();

        let err = router
            .commit_role(&pending_a, Role::Freelancer)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RouterError::StaleIdentity {
                expected: "a".to_string(),
                actual: Some("b".to_string()),
            }
        );
        assert_eq!(profiles.create_count(), 0);
        assert!(profiles.snapshot("a").is_none());
    }

    #[tokio::test]
    async fn commit_role_after_sign_out_is_rejected() {
        let (_, profiles, router) = setup();
        router
            .resolve(Session::authenticated(principal("a")))
            .await
            .unwrap();
        let pending = router.decision().pending_identity().cloned().unwrap();
        router.resolve(Session::signed_out()).await.unwrap();

        let err = router.commit_role(&pending, Role::Client).await.unwrap_err();
        assert!(matches!(err, RouterError::StaleIdentity { actual: None, .. }));
        assert_eq!(profiles.create_count(), 0);
    }

    #[tokio::test]
    async fn failed_commit_can_be_retried() {
        let (_, profiles, router) = setup();
        router
            .resolve(Session::authenticated(principal("a")))
            .await
            .unwrap();
        let pending = router.decision().pending_identity().cloned().unwrap();

        profiles.fail_next_write(StoreError::Unavailable("disk full".to_string()));
        let err = router.commit_role(&pending, Role::Client).await.unwrap_err();
        assert!(matches!(err, RouterError::PersistenceFailure(_)));
        assert!(matches!(router.state(), RouterState::NeedsRole { .. }));
        assert!(profiles.snapshot("a").is_none());

        let decision = router.commit_role(&pending, Role::Client).await.unwrap();
        assert_eq!(decision, RoutingDecision::ShowClientDashboard);
        assert_eq!(profiles.len(), 1);
    }

    #[tokio::test]
    async fn commit_role_without_pending_selection_is_rejected() {
        let (_, profiles, router) = setup();
        profiles.insert(record("a", None));
        let session = Session::authenticated(principal("a"));
        let ticket = router.observe(session).unwrap();
        let pending = PendingIdentity::from(&principal("a"));

        // Still resolving
        let err = router.commit_role(&pending, Role::Client).await.unwrap_err();
        assert_eq!(err, RouterError::NotAwaitingRole);
        drop(ticket);
    }
}
