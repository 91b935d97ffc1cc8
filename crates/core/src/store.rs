use async_trait::async_trait;
use shared::{ProfilePatch, ProfileRecord};

use crate::error::StoreError;

/// Document store holding one profile per principal id
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `Ok(None)` when no profile exists for the principal
    async fn get(&self, principal_id: &str) -> Result<Option<ProfileRecord>, StoreError>;

    /// Create or overwrite the document under `principal_id`
    async fn create(&self, principal_id: &str, record: &ProfileRecord) -> Result<(), StoreError>;

    /// Merge a partial update; `StoreError::NotFound` if absent
    async fn update(&self, principal_id: &str, patch: &ProfilePatch) -> Result<(), StoreError>;
}

/// Free-tier usage counters, one per principal
#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Current count, created at zero if absent
    async fn usage(&self, principal_id: &str) -> Result<u32, StoreError>;

    /// Persist one more use and return the new count
    async fn increment(&self, principal_id: &str) -> Result<u32, StoreError>;
}
