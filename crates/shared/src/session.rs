use serde::{Deserialize, Serialize};

/// Which federated identity provider a sign-in goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FederatedProvider {
    Google,
}

impl FederatedProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            FederatedProvider::Google => "google",
        }
    }
}

impl std::fmt::Display for FederatedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FederatedProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(FederatedProvider::Google),
            other => Err(format!("unknown federated provider: {}", other)),
        }
    }
}

/// Display hints handed over by a federated provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// The authenticated identity behind a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Opaque id, stable per account
    pub id: String,
    pub email: String,
    /// Present only for federated sign-ins
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federated: Option<FederatedHints>,
}

/// Current view of who is signed in.
///
/// A session is replaced wholesale on every authentication transition
/// (sign-in, sign-up, sign-out, refresh) and never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
}

impl Session {
    pub fn signed_out() -> Self {
        Self { principal: None }
    }

    pub fn authenticated(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }

    pub fn principal_id(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.id.as_str())
    }

    pub fn email(&self) -> Option<&str> {
        self.principal.as_ref().map(|p| p.email.as_str())
    }
}

/// Identity carried from the auth screen to role selection, so the role
/// screen can create the profile without asking the identity provider again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingIdentity {
    pub principal_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federated: Option<FederatedHints>,
}

impl From<&Principal> for PendingIdentity {
    fn from(principal: &Principal) -> Self {
        Self {
            principal_id: principal.id.clone(),
            email: principal.email.clone(),
            federated: principal.federated.clone(),
        }
    }
}
