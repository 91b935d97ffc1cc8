//! Types shared by the onboarding core, the backend and the CLI.

pub mod api;
pub mod demo;
pub mod profile;
pub mod routing;
pub mod session;

pub use api::*;
pub use demo::{Collection, Conversation, Job, JobStatus, Proposal, ProposalStatus};
pub use profile::{Plan, ProfilePatch, ProfileRecord, Role};
pub use routing::RoutingDecision;
pub use session::{FederatedHints, FederatedProvider, PendingIdentity, Principal, Session};
