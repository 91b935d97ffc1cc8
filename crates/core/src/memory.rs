//! In-process adapters. Useful for embedding the core without a backend and
//! for exercising the router and gate in tests; each one can be told to fail
//! its next call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::{FederatedHints, FederatedProvider, Principal, ProfilePatch, ProfileRecord, Session};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::{IdentityError, StoreError};
use crate::identity::{IdentityProvider, SessionFeed, SessionSubscription};
use crate::store::{ProfileStore, UsageStore};

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone)]
struct Account {
    id: String,
    email: String,
    /// `None` for accounts created through a federated provider
    secret: Option<String>,
    federated: Option<FederatedHints>,
}

impl Account {
    fn principal(&self) -> Principal {
        Principal {
            id: self.id.clone(),
            email: self.email.clone(),
            federated: self.federated.clone(),
        }
    }
}

/// What a federated provider hands back after its consent screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedAccount {
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Identity provider keeping accounts in memory. Secrets are compared as
/// given; this is a test double, not a credential store.
pub struct MemoryIdentityProvider {
    feed: SessionFeed,
    accounts: Mutex<HashMap<String, Account>>,
    federated: Mutex<HashMap<FederatedProvider, Result<FederatedAccount, IdentityError>>>,
    refreshes: AtomicUsize,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self {
            feed: SessionFeed::new(),
            accounts: Mutex::new(HashMap::new()),
            federated: Mutex::new(HashMap::new()),
            refreshes: AtomicUsize::new(0),
        }
    }

    /// Decide how the next federated sign-ins through `provider` end
    pub fn script_federated(
        &self,
        provider: FederatedProvider,
        outcome: Result<FederatedAccount, IdentityError>,
    ) {
        self.federated.lock().insert(provider, outcome);
    }

    /// Publish an arbitrary session, as if the provider restored it
    pub fn set_session(&self, session: Session) {
        self.feed.publish(session);
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn feed(&self) -> &SessionFeed {
        &self.feed
    }

    fn emit(&self, account: &Account) -> Session {
        let session = Session::authenticated(account.principal());
        self.feed.publish(session.clone());
        session
    }
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        secret: &str,
    ) -> Result<Session, IdentityError> {
        let account = self
            .accounts
            .lock()
            .get(email)
            .filter(|a| a.secret.as_deref() == Some(secret))
            .cloned()
            .ok_or(IdentityError::InvalidCredentials)?;
        Ok(self.emit(&account))
    }

    async fn sign_up_with_password(
        &self,
        email: &str,
        secret: &str,
    ) -> Result<Session, IdentityError> {
        let account = {
            let mut accounts = self.accounts.lock();
            if accounts.contains_key(email) {
                return Err(IdentityError::EmailInUse);
            }
            let account = Account {
                id: Uuid::new_v4().to_string(),
                email: email.to_string(),
                secret: Some(secret.to_string()),
                federated: None,
            };
            accounts.insert(email.to_string(), account.clone());
            account
        };
        Ok(self.emit(&account))
    }

    async fn sign_in_federated(
        &self,
        provider: FederatedProvider,
    ) -> Result<Session, IdentityError> {
        let outcome = self
            .federated
            .lock()
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| {
                Err(IdentityError::ProviderError(format!(
                    "{} sign-in is not configured",
                    provider
                )))
            });
        let external = outcome?;

        let hints = FederatedHints {
            display_name: external.display_name,
            avatar_url: external.avatar_url,
        };
        let account = {
            let mut accounts = self.accounts.lock();
            let account = accounts
                .entry(external.email.clone())
                .or_insert_with(|| Account {
                    id: Uuid::new_v4().to_string(),
                    email: external.email.clone(),
                    secret: None,
                    federated: None,
                });
            account.federated = Some(hints);
            account.clone()
        };
        Ok(self.emit(&account))
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.feed.publish(Session::signed_out());
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Session, IdentityError> {
        let current = self.feed.current();
        if !current.is_authenticated() {
            return Err(IdentityError::NotSignedIn);
        }
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.feed.publish(current.clone());
        Ok(current)
    }

    fn current_session(&self) -> Session {
        self.feed.current()
    }

    fn subscribe(&self) -> SessionSubscription {
        self.feed.subscribe()
    }
}

// ============================================================================
// Profiles
// ============================================================================

#[derive(Default)]
struct ProfileState {
    records: HashMap<String, ProfileRecord>,
    fail_get: Option<StoreError>,
    fail_write: Option<StoreError>,
    held: HashMap<String, Arc<Notify>>,
    creates: usize,
    updates: usize,
}

#[derive(Default)]
pub struct MemoryProfileStore {
    state: Mutex<ProfileState>,
}

/// Keeps one profile lookup suspended until released
pub struct HeldLookup {
    notify: Arc<Notify>,
}

impl HeldLookup {
    pub fn release(self) {
        self.notify.notify_one();
    }
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: ProfileRecord) {
        self.state.lock().records.insert(record.id.clone(), record);
    }

    pub fn snapshot(&self, principal_id: &str) -> Option<ProfileRecord> {
        self.state.lock().records.get(principal_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn create_count(&self) -> usize {
        self.state.lock().creates
    }

    pub fn update_count(&self) -> usize {
        self.state.lock().updates
    }

    pub fn fail_next_get(&self, error: StoreError) {
        self.state.lock().fail_get = Some(error);
    }

    pub fn fail_next_write(&self, error: StoreError) {
        self.state.lock().fail_write = Some(error);
    }

    /// Suspend the next lookup of `principal_id` until the returned handle
    /// is released.
    pub fn hold_lookup(&self, principal_id: &str) -> HeldLookup {
        let notify = Arc::new(Notify::new());
        self.state
            .lock()
            .held
            .insert(principal_id.to_string(), notify.clone());
        HeldLookup { notify }
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get(&self, principal_id: &str) -> Result<Option<ProfileRecord>, StoreError> {
        let held = self.state.lock().held.remove(principal_id);
        if let Some(notify) = held {
            notify.notified().await;
        }

        let mut state = self.state.lock();
        if let Some(error) = state.fail_get.take() {
            return Err(error);
        }
        Ok(state.records.get(principal_id).cloned())
    }

    async fn create(&self, principal_id: &str, record: &ProfileRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_write.take() {
            return Err(error);
        }
        state.records.insert(principal_id.to_string(), record.clone());
        state.creates += 1;
        Ok(())
    }

    async fn update(&self, principal_id: &str, patch: &ProfilePatch) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_write.take() {
            return Err(error);
        }
        let record = state
            .records
            .get_mut(principal_id)
            .ok_or_else(|| StoreError::NotFound {
                id: principal_id.to_string(),
            })?;
        record.apply(patch);
        state.updates += 1;
        Ok(())
    }
}

// ============================================================================
// Usage counters
// ============================================================================

#[derive(Default)]
struct UsageState {
    counts: HashMap<String, u32>,
    fail_increment: Option<StoreError>,
}

#[derive(Default)]
pub struct MemoryUsageStore {
    state: Mutex<UsageState>,
}

impl MemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, principal_id: &str) -> Option<u32> {
        self.state.lock().counts.get(principal_id).copied()
    }

    pub fn fail_next_increment(&self, error: StoreError) {
        self.state.lock().fail_increment = Some(error);
    }
}

#[async_trait]
impl UsageStore for MemoryUsageStore {
    async fn usage(&self, principal_id: &str) -> Result<u32, StoreError> {
        Ok(*self
            .state
            .lock()
            .counts
            .entry(principal_id.to_string())
            .or_insert(0))
    }

    async fn increment(&self, principal_id: &str) -> Result<u32, StoreError> {
        let mut state = self.state.lock();
        if let Some(error) = state.fail_increment.take() {
            return Err(error);
        }
        let count = state.counts.entry(principal_id.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_up_then_sign_in() {
        let identity = MemoryIdentityProvider::new();
        let created = identity.sign_up_with_password("a@b.com", "pw").await.unwrap();
        let signed_in = identity.sign_in_with_password("a@b.com", "pw").await.unwrap();
        assert_eq!(created.principal_id(), signed_in.principal_id());
        assert_eq!(identity.current_session(), signed_in);
    }

    #[tokio::test]
    async fn identity_rejections() {
        let identity = MemoryIdentityProvider::new();
        identity.sign_up_with_password("a@b.com", "pw").await.unwrap();

        assert_eq!(
            identity.sign_up_with_password("a@b.com", "other").await,
            Err(IdentityError::EmailInUse)
        );
        assert_eq!(
            identity.sign_in_with_password("a@b.com", "wrong").await,
            Err(IdentityError::InvalidCredentials)
        );
        assert_eq!(
            identity.sign_in_with_password("nobody@b.com", "pw").await,
            Err(IdentityError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn federated_sign_in_carries_hints() {
        let identity = MemoryIdentityProvider::new();
        identity.script_federated(
            FederatedProvider::Google,
            Ok(FederatedAccount {
                email: "g@gmail.com".to_string(),
                display_name: Some("Gee".to_string()),
                avatar_url: Some("https://img/g.png".to_string()),
            }),
        );

        let session = identity
            .sign_in_federated(FederatedProvider::Google)
            .await
            .unwrap();
        let hints = session.principal.unwrap().federated.unwrap();
        assert_eq!(hints.display_name.as_deref(), Some("Gee"));
    }

    #[tokio::test]
    async fn federated_popup_closed_keeps_session() {
        let identity = MemoryIdentityProvider::new();
        identity.script_federated(FederatedProvider::Google, Err(IdentityError::PopupClosed));

        let err = identity
            .sign_in_federated(FederatedProvider::Google)
            .await
            .unwrap_err();
        assert_eq!(err, IdentityError::PopupClosed);
        assert!(!identity.current_session().is_authenticated());
    }

    #[tokio::test]
    async fn refresh_requires_session_and_re_emits() {
        let identity = MemoryIdentityProvider::new();
        assert_eq!(
            identity.refresh_session().await,
            Err(IdentityError::NotSignedIn)
        );

        identity.sign_up_with_password("a@b.com", "pw").await.unwrap();
        let mut sub = identity.subscribe();
        let initial = sub.recv().await.unwrap();

        identity.refresh_session().await.unwrap();
        assert_eq!(sub.recv().await.unwrap(), initial);
        assert_eq!(identity.refresh_count(), 1);
    }

    #[tokio::test]
    async fn update_missing_profile_is_not_found() {
        let store = MemoryProfileStore::new();
        let err = store
            .update("nobody", &ProfilePatch::default())
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::NotFound { id: "nobody".to_string() });
    }
}
