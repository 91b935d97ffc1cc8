use serde::{Deserialize, Serialize};

use crate::profile::Role;
use crate::session::PendingIdentity;

/// Which screen the user should be looking at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum RoutingDecision {
    ShowAuth,
    ShowRoleSelection { pending: PendingIdentity },
    ShowFreelancerDashboard,
    ShowClientDashboard,
    ShowLoadingIndicator,
}

impl RoutingDecision {
    pub fn dashboard(role: Role) -> Self {
        match role {
            Role::Freelancer => RoutingDecision::ShowFreelancerDashboard,
            Role::Client => RoutingDecision::ShowClientDashboard,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, RoutingDecision::ShowLoadingIndicator)
    }

    pub fn pending_identity(&self) -> Option<&PendingIdentity> {
        match self {
            RoutingDecision::ShowRoleSelection { pending } => Some(pending),
            _ => None,
        }
    }
}

impl std::fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingDecision::ShowAuth => f.write_str("auth"),
            RoutingDecision::ShowRoleSelection { pending } => {
                write!(f, "role-selection ({})", pending.email)
            }
            RoutingDecision::ShowFreelancerDashboard => f.write_str("freelancer-dashboard"),
            RoutingDecision::ShowClientDashboard => f.write_str("client-dashboard"),
            RoutingDecision::ShowLoadingIndicator => f.write_str("loading"),
        }
    }
}
