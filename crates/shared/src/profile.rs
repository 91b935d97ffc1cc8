use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::PendingIdentity;

pub const DEFAULT_AVATAR: &str = "https://via.placeholder.com/150";
pub const DEFAULT_FREELANCER_TITLE: &str = "Freelancer";
pub const DEFAULT_HOURLY_RATE: u32 = 25;
pub const DEFAULT_COMPANY: &str = "My Company";
pub const DEFAULT_LOCATION: &str = "Unknown";

/// Marketplace role chosen once during onboarding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Freelancer,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Freelancer => "freelancer",
            Role::Client => "client",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "freelancer" => Ok(Role::Freelancer),
            "client" => Ok(Role::Client),
            other => Err(format!("unknown role: {} (expected freelancer or client)", other)),
        }
    }
}

/// Freelancer subscription plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Premium,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Premium => "premium",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "premium" => Ok(Plan::Premium),
            other => Err(format!("unknown plan: {} (expected free or premium)", other)),
        }
    }
}

/// Durable marketplace identity of one principal, stored as a document
/// keyed by the principal id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<Role>,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub avatar: String,

    // Freelancer fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,

    // Client fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ProfileRecord {
    /// Initial record written when a principal picks a role.
    pub fn for_role(pending: &PendingIdentity, role: Role, created_at: DateTime<Utc>) -> Self {
        let hints = pending.federated.as_ref();
        let name = hints
            .and_then(|h| h.display_name.clone())
            .filter(|n| !n.is_empty())
            .or_else(|| {
                pending
                    .email
                    .split('@')
                    .next()
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "New User".to_string());
        let avatar = hints
            .and_then(|h| h.avatar_url.clone())
            .unwrap_or_else(|| DEFAULT_AVATAR.to_string());

        let mut record = Self {
            id: pending.principal_id.clone(),
            email: pending.email.clone(),
            role: Some(role),
            created_at,
            name,
            avatar,
            title: None,
            skills: None,
            hourly_rate: None,
            bio: None,
            plan: None,
            company: None,
            location: None,
        };

        match role {
            Role::Freelancer => {
                record.title = Some(DEFAULT_FREELANCER_TITLE.to_string());
                record.skills = Some(BTreeSet::new());
                record.hourly_rate = Some(DEFAULT_HOURLY_RATE);
            }
            Role::Client => {
                record.company = Some(DEFAULT_COMPANY.to_string());
                record.location = Some(DEFAULT_LOCATION.to_string());
            }
        }

        record
    }

    /// Merge a dashboard edit into the record. Identity fields are not
    /// part of a patch and stay untouched.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(avatar) = &patch.avatar {
            self.avatar = avatar.clone();
        }
        if let Some(title) = &patch.title {
            self.title = Some(title.clone());
        }
        if let Some(skills) = &patch.skills {
            self.skills = Some(skills.clone());
        }
        if let Some(rate) = patch.hourly_rate {
            self.hourly_rate = Some(rate);
        }
        if let Some(bio) = &patch.bio {
            self.bio = Some(bio.clone());
        }
        if let Some(plan) = patch.plan {
            self.plan = Some(plan);
        }
        if let Some(company) = &patch.company {
            self.company = Some(company.clone());
        }
        if let Some(location) = &patch.location {
            self.location = Some(location.clone());
        }
    }
}

/// Partial update issued by the dashboards. Carries no `role`: only the
/// onboarding router writes a profile's role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ProfilePatch {
    pub fn plan(plan: Plan) -> Self {
        Self {
            plan: Some(plan),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FederatedHints;

    fn pending(email: &str) -> PendingIdentity {
        PendingIdentity {
            principal_id: "uid-42".to_string(),
            email: email.to_string(),
            federated: None,
        }
    }

    #[test]
    fn freelancer_defaults() {
        let record = ProfileRecord::for_role(&pending("a@b.com"), Role::Freelancer, Utc::now());
        assert_eq!(record.id, "uid-42");
        assert_eq!(record.role, Some(Role::Freelancer));
        assert_eq!(record.name, "a");
        assert_eq!(record.title.as_deref(), Some("Freelancer"));
        assert_eq!(record.hourly_rate, Some(25));
        assert_eq!(record.skills, Some(BTreeSet::new()));
        assert_eq!(record.company, None);
        assert_eq!(record.plan, None);
    }

    #[test]
    fn client_defaults() {
        let record = ProfileRecord::for_role(&pending("boss@corp.io"), Role::Client, Utc::now());
        assert_eq!(record.company.as_deref(), Some("My Company"));
        assert_eq!(record.location.as_deref(), Some("Unknown"));
        assert_eq!(record.title, None);
        assert_eq!(record.avatar, DEFAULT_AVATAR);
    }

    #[test]
    fn federated_hints_win_over_email() {
        let mut identity = pending("x@y.z");
        identity.federated = Some(FederatedHints {
            display_name: Some("Ada Lovelace".to_string()),
            avatar_url: Some("https://img/ada.png".to_string()),
        });
        let record = ProfileRecord::for_role(&identity, Role::Client, Utc::now());
        assert_eq!(record.name, "Ada Lovelace");
        assert_eq!(record.avatar, "https://img/ada.png");
    }

    #[test]
    fn empty_local_part_falls_back_to_new_user() {
        let record = ProfileRecord::for_role(&pending("@nowhere"), Role::Client, Utc::now());
        assert_eq!(record.name, "New User");
    }

    #[test]
    fn document_uses_camel_case() {
        let record = ProfileRecord::for_role(&pending("a@b.com"), Role::Freelancer, Utc::now());
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["hourlyRate"], 25);
        assert_eq!(value["role"], "freelancer");
        assert_eq!(value["skills"], serde_json::json!([]));
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn patch_leaves_identity_alone() {
        let mut record = ProfileRecord::for_role(&pending("a@b.com"), Role::Freelancer, Utc::now());
        let patch = ProfilePatch {
            title: Some("Rust Engineer".to_string()),
            hourly_rate: Some(90),
            plan: Some(Plan::Free),
            ..ProfilePatch::default()
        };
        record.apply(&patch);
        assert_eq!(record.title.as_deref(), Some("Rust Engineer"));
        assert_eq!(record.hourly_rate, Some(90));
        assert_eq!(record.plan, Some(Plan::Free));
        assert_eq!(record.role, Some(Role::Freelancer));
        assert_eq!(record.id, "uid-42");
    }

    #[test]
    fn missing_role_reads_as_unset() {
        let json = serde_json::json!({
            "id": "u1",
            "email": "u1@x.io",
            "createdAt": "2025-05-01T00:00:00Z",
            "name": "u1",
            "avatar": DEFAULT_AVATAR,
        });
        let record: ProfileRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.role, None);
    }
}
