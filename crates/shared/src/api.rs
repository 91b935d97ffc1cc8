use serde::{Deserialize, Serialize};

use crate::session::{FederatedProvider, Session};

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Issued on every successful sign-in, sign-up or refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub session: Session,
}

// ============================================================================
// Federated sign-in (device code flow)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeRequest {
    pub provider: FederatedProvider,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeResponse {
    pub code: String,
    pub url: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicePollRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DevicePollResponse {
    Pending,
    Success { token: String, session: Session },
    Expired,
}

/// Posted by the provider callback page once the user finished the
/// provider's consent screen. Account details are taken from the signed
/// `id_token`, never from the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCompleteRequest {
    pub code: String,
    pub id_token: String,
}

// ============================================================================
// Usage counters
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UsageResponse {
    pub count: u32,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
