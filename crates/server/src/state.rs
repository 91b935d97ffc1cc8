use crate::{config::Config, db::Database};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use shared::FederatedProvider;
use std::sync::Arc;

/// Pending federated sign-in, keyed by device code
#[derive(Debug, Clone)]
pub struct DeviceCodeState {
    pub provider: FederatedProvider,
    pub expires_at: DateTime<Utc>,
    /// Set once the provider callback linked the code to an account
    pub user_id: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Config,
    pub device_codes: Arc<DashMap<String, DeviceCodeState>>,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        Self {
            db,
            config,
            device_codes: Arc::new(DashMap::new()),
        }
    }
}
