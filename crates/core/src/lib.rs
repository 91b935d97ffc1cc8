//! Onboarding core: the auth router that picks a user's screen, the
//! freemium gate for freelancers, and the adapter traits both depend on.

pub mod driver;
pub mod error;
pub mod gate;
pub mod identity;
pub mod memory;
pub mod router;
pub mod store;

pub use driver::{RouteUpdate, RouterDriver};
pub use error::{GateError, IdentityError, RouterError, StoreError};
pub use gate::{DenialReason, FreemiumGate, GateDecision, PlanState, FREE_ACTION_LIMIT};
pub use identity::{IdentityProvider, SessionFeed, SessionSubscription};
pub use router::{AuthRouter, LookupTicket, Resolution, RouterState};
pub use store::{ProfileStore, UsageStore};
