use shared::{Plan, Role};
use thiserror::Error;

/// Failures reported by a profile or usage store adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found: {id}")]
    NotFound { id: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store rejected the request: {0}")]
    Rejected(String),
}

/// Failures reported by an identity provider adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailInUse,

    #[error("Sign-in window was closed before completing")]
    PopupClosed,

    #[error("Identity provider error: {0}")]
    ProviderError(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Identity service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// Shown to the user as a verification error
    #[error("Error verifying user account: {0}")]
    TransientLookupFailure(StoreError),

    #[error("Role selection belongs to {expected}, but the signed-in account is {}", .actual.as_deref().unwrap_or("nobody"))]
    StaleIdentity {
        expected: String,
        actual: Option<String>,
    },

    #[error("Error saving role, please try again: {0}")]
    PersistenceFailure(StoreError),

    #[error("Account already has the {role} role")]
    RoleAlreadySet { role: Role },

    #[error("No role selection is pending for this account")]
    NotAwaitingRole,

    #[error("Session changed while the operation was in flight")]
    Superseded,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("No profile found for {id}")]
    ProfileMissing { id: String },

    #[error("Plan already selected: {current}")]
    PlanAlreadySelected { current: Plan },

    #[error("Choose a plan first")]
    PlanNotSelected,

    #[error("Error loading plan: {0}")]
    LookupFailure(StoreError),

    #[error("Error saving plan or usage: {0}")]
    PersistenceFailure(StoreError),
}
