//! Core adapters backed by the hub server

use async_trait::async_trait;
use hub_core::{IdentityError, IdentityProvider, ProfileStore, SessionFeed, SessionSubscription, StoreError, UsageStore};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    AuthResponse, Collection, FederatedProvider, LoginRequest, ProfilePatch, ProfileRecord,
    RegisterRequest, Session, UsageResponse,
};

use crate::api::{ApiClient, ApiError};
use crate::auth::DeviceLogin;

fn store_error(e: ApiError) -> StoreError {
    match e.status() {
        Some(status) if status.is_client_error() => StoreError::Rejected(e.message()),
        _ => StoreError::Unavailable(e.to_string()),
    }
}

fn identity_error(e: ApiError) -> IdentityError {
    match e.status() {
        Some(status) if status.is_client_error() => IdentityError::ProviderError(e.message()),
        _ => IdentityError::Unavailable(e.to_string()),
    }
}

// ============================================================================
// Identity
// ============================================================================

pub struct RemoteIdentity {
    api: ApiClient,
    feed: SessionFeed,
    device_login: DeviceLogin,
}

impl RemoteIdentity {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            feed: SessionFeed::new(),
            device_login: DeviceLogin::default(),
        }
    }

    pub fn with_device_login(mut self, device_login: DeviceLogin) -> Self {
        self.device_login = device_login;
        self
    }

    /// Resume a session saved by an earlier run. The server is not asked;
    /// a stale token surfaces on the first request that needs it.
    pub fn restore(&self, token: String, session: Session) {
        self.api.set_token(Some(token));
        self.feed.publish(session);
    }

    pub fn token(&self) -> Option<String> {
        self.api.token()
    }

    fn accept(&self, resp: AuthResponse) -> Session {
        self.api.set_token(Some(resp.token));
        self.feed.publish(resp.session.clone());
        resp.session
    }

    fn drop_session(&self) {
        self.api.set_token(None);
        self.feed.publish(Session::signed_out());
    }
}

#[async_trait]
impl IdentityProvider for RemoteIdentity {
    async fn sign_in_with_password(
        &self,
        email: &str,
        secret: &str,
    ) -> Result<Session, IdentityError> {
        let req = LoginRequest {
            email: email.to_string(),
            password: secret.to_string(),
        };
        match self.api.post::<_, AuthResponse>("/auth/login", &req).await {
            Ok(resp) => Ok(self.accept(resp)),
            Err(e) if e.status() == Some(StatusCode::UNAUTHORIZED) => {
                Err(IdentityError::InvalidCredentials)
            }
            Err(e) => Err(identity_error(e)),
        }
    }

    async fn sign_up_with_password(
        &self,
        email: &str,
        secret: &str,
    ) -> Result<Session, IdentityError> {
        let req = RegisterRequest {
            email: email.to_string(),
            password: secret.to_string(),
        };
        match self.api.post::<_, AuthResponse>("/auth/register", &req).await {
            Ok(resp) => Ok(self.accept(resp)),
            Err(e) if e.status() == Some(StatusCode::CONFLICT) => Err(IdentityError::EmailInUse),
            Err(e) => Err(identity_error(e)),
        }
    }

    async fn sign_in_federated(
        &self,
        provider: FederatedProvider,
    ) -> Result<Session, IdentityError> {
        let resp = self.device_login.run(&self.api, provider).await?;
        Ok(self.accept(resp))
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.drop_session();
        Ok(())
    }

    async fn refresh_session(&self) -> Result<Session, IdentityError> {
        if self.api.token().is_none() {
            return Err(IdentityError::NotSignedIn);
        }
        match self.api.post_empty::<AuthResponse>("/auth/refresh").await {
            Ok(resp) => Ok(self.accept(resp)),
            Err(e) if e.status() == Some(StatusCode::UNAUTHORIZED) => {
                tracing::warn!("Session rejected by server: {}", e.message());
                self.drop_session();
                Err(IdentityError::NotSignedIn)
            }
            Err(e) => Err(identity_error(e)),
        }
    }

    fn current_session(&self) -> Session {
        self.feed.current()
    }

    fn subscribe(&self) -> SessionSubscription {
        self.feed.subscribe()
    }
}

// ============================================================================
// Stores
// ============================================================================

pub struct RemoteProfileStore {
    api: ApiClient,
}

impl RemoteProfileStore {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ProfileStore for RemoteProfileStore {
    async fn get(&self, principal_id: &str) -> Result<Option<ProfileRecord>, StoreError> {
        self.api
            .get_optional(&format!("/profiles/{}", principal_id))
            .await
            .map_err(store_error)
    }

    async fn create(&self, principal_id: &str, record: &ProfileRecord) -> Result<(), StoreError> {
        self.api
            .put::<_, ProfileRecord>(&format!("/profiles/{}", principal_id), record)
            .await
            .map(|_| ())
            .map_err(store_error)
    }

    async fn update(&self, principal_id: &str, patch: &ProfilePatch) -> Result<(), StoreError> {
        match self
            .api
            .patch::<_, ProfileRecord>(&format!("/profiles/{}", principal_id), patch)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => Err(StoreError::NotFound {
                id: principal_id.to_string(),
            }),
            Err(e) => Err(store_error(e)),
        }
    }
}

pub struct RemoteUsageStore {
    api: ApiClient,
}

impl RemoteUsageStore {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl UsageStore for RemoteUsageStore {
    async fn usage(&self, principal_id: &str) -> Result<u32, StoreError> {
        self.api
            .get::<UsageResponse>(&format!("/usage/{}", principal_id))
            .await
            .map(|r| r.count)
            .map_err(store_error)
    }

    async fn increment(&self, principal_id: &str) -> Result<u32, StoreError> {
        self.api
            .post_empty::<UsageResponse>(&format!("/usage/{}/increment", principal_id))
            .await
            .map(|r| r.count)
            .map_err(store_error)
    }
}

/// Demo collections, read and written as whole arrays
pub struct RemoteCollections {
    api: ApiClient,
}

impl RemoteCollections {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn fetch<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>, StoreError> {
        self.api
            .get(&format!("/collections/{}", collection))
            .await
            .map_err(store_error)
    }

    pub async fn store<T: Serialize>(&self, collection: Collection, items: &[T]) -> Result<(), StoreError> {
        self.api
            .put::<_, serde_json::Value>(&format!("/collections/{}", collection), items)
            .await
            .map(|_| ())
            .map_err(store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use shared::{Job, Plan};

    fn session_json(id: &str) -> serde_json::Value {
        json!({ "principal": { "id": id, "email": format!("{}@example.com", id) } })
    }

    #[tokio::test]
    async fn sign_in_publishes_session_and_keeps_token() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/auth/login");
            then.status(200)
                .json_body(json!({ "token": "jwt-1", "session": session_json("u1") }));
        });

        let identity = RemoteIdentity::new(ApiClient::new(&server.base_url()));
        let mut sub = identity.subscribe();
        assert_eq!(sub.recv().await, Some(Session::signed_out()));

        let session = identity
            .sign_in_with_password("u1@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(session.principal_id(), Some("u1"));
        assert_eq!(sub.recv().await, Some(session));
        assert_eq!(identity.token().as_deref(), Some("jwt-1"));
    }

    #[tokio::test]
    async fn status_codes_map_to_identity_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/auth/login");
            then.status(401).json_body(json!({ "error": "Invalid email or password" }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/auth/register");
            then.status(409).json_body(json!({ "error": "Email already registered" }));
        });

        let identity = RemoteIdentity::new(ApiClient::new(&server.base_url()));
        assert_eq!(
            identity.sign_in_with_password("a@b.com", "x").await.unwrap_err(),
            IdentityError::InvalidCredentials
        );
        assert_eq!(
            identity.sign_up_with_password("a@b.com", "secret").await.unwrap_err(),
            IdentityError::EmailInUse
        );
        assert!(!identity.current_session().is_authenticated());
    }

    #[tokio::test]
    async fn rejected_refresh_signs_out() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/auth/refresh");
            then.status(401).json_body(json!({ "error": "ExpiredSignature" }));
        });

        let identity = RemoteIdentity::new(ApiClient::new(&server.base_url()));
        identity.restore(
            "stale".to_string(),
            serde_json::from_value(session_json("u1")).unwrap(),
        );

        assert_eq!(
            identity.refresh_session().await.unwrap_err(),
            IdentityError::NotSignedIn
        );
        assert!(!identity.current_session().is_authenticated());
        assert!(identity.token().is_none());
    }

    #[tokio::test]
    async fn refresh_without_token_is_not_signed_in() {
        let identity = RemoteIdentity::new(ApiClient::new("http://127.0.0.1:9"));
        assert_eq!(
            identity.refresh_session().await.unwrap_err(),
            IdentityError::NotSignedIn
        );
    }

    #[tokio::test]
    async fn missing_profile_reads_as_none_and_patch_as_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/profiles/u1");
            then.status(404).json_body(json!({ "error": "No profile for u1" }));
        });
        server.mock(|when, then| {
            when.method(PATCH).path("/profiles/u1");
            then.status(404).json_body(json!({ "error": "No profile for u1" }));
        });

        let store = RemoteProfileStore::new(ApiClient::new(&server.base_url()));
        assert_eq!(store.get("u1").await.unwrap(), None);
        assert_eq!(
            store.update("u1", &ProfilePatch::plan(Plan::Free)).await.unwrap_err(),
            StoreError::NotFound { id: "u1".to_string() }
        );
    }

    #[tokio::test]
    async fn server_errors_are_unavailable() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/profiles/u1");
            then.status(500).json_body(json!({ "error": "Internal error: disk" }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/usage/u1/increment");
            then.status(403).json_body(json!({ "error": "Not allowed" }));
        });

        let api = ApiClient::new(&server.base_url());
        assert!(matches!(
            RemoteProfileStore::new(api.clone()).get("u1").await.unwrap_err(),
            StoreError::Unavailable(_)
        ));
        assert_eq!(
            RemoteUsageStore::new(api).increment("u1").await.unwrap_err(),
            StoreError::Rejected("Not allowed".to_string())
        );
    }

    #[tokio::test]
    async fn usage_counts_come_from_server() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/usage/u1");
            then.status(200).json_body(json!({ "count": 0 }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/usage/u1/increment");
            then.status(200).json_body(json!({ "count": 1 }));
        });

        let usage = RemoteUsageStore::new(ApiClient::new(&server.base_url()));
        assert_eq!(usage.usage("u1").await.unwrap(), 0);
        assert_eq!(usage.increment("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn collections_round_trip_through_server() {
        let server = MockServer::start();
        let jobs = serde_json::to_value(shared::demo::demo_jobs()).unwrap();
        server.mock(|when, then| {
            when.method(GET).path("/collections/jobs");
            then.status(200).json_body(jobs.clone());
        });
        let put = server.mock(|when, then| {
            when.method(PUT).path("/collections/jobs");
            then.status(200).json_body(json!([]));
        });

        let collections = RemoteCollections::new(ApiClient::new(&server.base_url()));
        let fetched: Vec<Job> = collections.fetch(Collection::Jobs).await.unwrap();
        assert_eq!(fetched.len(), 2);

        collections.store::<Job>(Collection::Jobs, &[]).await.unwrap();
        put.assert();
    }
}
