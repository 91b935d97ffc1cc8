use shared::{FederatedHints, Principal, Session};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    /// `None` for accounts only ever used through a federated provider
    pub password_hash: Option<String>,
    pub provider: Option<String>,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: Option<String>,
}

impl User {
    pub fn principal(&self) -> Principal {
        let federated = self.provider.as_ref().map(|_| FederatedHints {
            display_name: self.display_name.clone(),
            avatar_url: self.photo_url.clone(),
        });
        Principal {
            id: self.id.clone(),
            email: self.email.clone(),
            federated,
        }
    }

    pub fn session(&self) -> Session {
        Session::authenticated(self.principal())
    }
}

/// Provider-supplied account details from a completed federated sign-in
#[derive(Debug, Clone)]
pub struct FederatedLogin {
    pub email: String,
    pub provider: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}
