//! Freemium gate for the freelancer dashboard.
//!
//! A freelancer picks a plan once. On the free plan, one quota-limited
//! action (submitting a proposal) is allowed `FREE_ACTION_LIMIT` times;
//! upgrading to premium lifts the limit for good.

use std::sync::Arc;

use shared::{Plan, ProfilePatch};

use crate::error::{GateError, StoreError};
use crate::store::{ProfileStore, UsageStore};

pub const FREE_ACTION_LIMIT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    PlanUnset,
    PlanFree,
    PlanPremium,
}

impl From<Option<Plan>> for PlanState {
    fn from(plan: Option<Plan>) -> Self {
        match plan {
            None => PlanState::PlanUnset,
            Some(Plan::Free) => PlanState::PlanFree,
            Some(Plan::Premium) => PlanState::PlanPremium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    QuotaExceeded,
    PlanNotSelected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Permitted,
    Denied(DenialReason),
}

impl GateDecision {
    pub fn is_permitted(&self) -> bool {
        matches!(self, GateDecision::Permitted)
    }
}

pub struct FreemiumGate {
    principal_id: String,
    plan: Option<Plan>,
    count: u32,
    profiles: Arc<dyn ProfileStore>,
    usage: Arc<dyn UsageStore>,
}

impl FreemiumGate {
    /// Read the plan from the principal's profile and its usage counter.
    pub async fn load(
        principal_id: &str,
        profiles: Arc<dyn ProfileStore>,
        usage: Arc<dyn UsageStore>,
    ) -> Result<Self, GateError> {
        let profile = profiles
            .get(principal_id)
            .await
            .map_err(GateError::LookupFailure)?
            .ok_or_else(|| GateError::ProfileMissing {
                id: principal_id.to_string(),
            })?;
        let count = usage
            .usage(principal_id)
            .await
            .map_err(GateError::LookupFailure)?;

        tracing::debug!(
            "Gate loaded for {}: plan={:?} count={}",
            principal_id,
            profile.plan,
            count
        );

        Ok(Self {
            principal_id: principal_id.to_string(),
            plan: profile.plan,
            count,
            profiles,
            usage,
        })
    }

    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }

    pub fn plan(&self) -> Option<Plan> {
        self.plan
    }

    pub fn plan_state(&self) -> PlanState {
        PlanState::from(self.plan)
    }

    pub fn usage_count(&self) -> u32 {
        self.count
    }

    /// Free actions left, `None` when unlimited or no plan chosen yet
    pub fn remaining_free_actions(&self) -> Option<u32> {
        match self.plan {
            Some(Plan::Free) => Some(FREE_ACTION_LIMIT.saturating_sub(self.count)),
            _ => None,
        }
    }

    /// Choose the initial plan. Picking the current plan again is a no-op;
    /// any other change once a plan is set is refused.
    pub async fn select_plan(&mut self, plan: Plan) -> Result<PlanState, GateError> {
        match self.plan {
            Some(current) if current == plan => return Ok(self.plan_state()),
            Some(current) => return Err(GateError::PlanAlreadySelected { current }),
            None => {}
        }

        self.persist_plan(plan).await?;
        tracing::info!("{} selected the {} plan", self.principal_id, plan);
        Ok(self.plan_state())
    }

    pub fn attempt_gated_action(&self) -> GateDecision {
        match self.plan {
            None => GateDecision::Denied(DenialReason::PlanNotSelected),
            Some(Plan::Free) if self.count >= FREE_ACTION_LIMIT => {
                GateDecision::Denied(DenialReason::QuotaExceeded)
            }
            Some(_) => GateDecision::Permitted,
        }
    }

    /// Count one completed gated action. Only the free plan is metered.
    pub async fn record_usage(&mut self) -> Result<u32, GateError> {
        match self.plan {
            None => Err(GateError::PlanNotSelected),
            Some(Plan::Premium) => Ok(self.count),
            Some(Plan::Free) => {
                let count = self
                    .usage
                    .increment(&self.principal_id)
                    .await
                    .map_err(GateError::PersistenceFailure)?;
                self.count = count;
                tracing::debug!("{} used {} free action(s)", self.principal_id, count);
                Ok(count)
            }
        }
    }

    /// Move to premium. There is no way back.
    pub async fn upgrade(&mut self) -> Result<PlanState, GateError> {
        if self.plan == Some(Plan::Premium) {
            return Ok(PlanState::PlanPremium);
        }
        self.persist_plan(Plan::Premium).await?;
        tracing::info!("{} upgraded to premium", self.principal_id);
        Ok(PlanState::PlanPremium)
    }

    async fn persist_plan(&mut self, plan: Plan) -> Result<(), GateError> {
        self.profiles
            .update(&self.principal_id, &ProfilePatch::plan(plan))
            .await
            .map_err(|e| match e {
                StoreError::NotFound { id } => GateError::ProfileMissing { id },
                other => GateError::PersistenceFailure(other),
            })?;
        self.plan = Some(plan);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryProfileStore, MemoryUsageStore};
    use chrono::Utc;
    use shared::{PendingIdentity, ProfileRecord, Role};

    async fn gate_with(plan: Option<Plan>) -> (FreemiumGate, Arc<MemoryProfileStore>, Arc<MemoryUsageStore>) {
        let profiles = Arc::new(MemoryProfileStore::new());
        let usage = Arc::new(MemoryUsageStore::new());
        let pending = PendingIdentity {
            principal_id: "f1".to_string(),
            email: "f1@example.com".to_string(),
            federated: None,
        };
        let mut record = ProfileRecord::for_role(&pending, Role::Freelancer, Utc::now());
        record.plan = plan;
        profiles.insert(record);

        let gate = FreemiumGate::load("f1", profiles.clone(), usage.clone())
            .await
            .unwrap();
        (gate, profiles, usage)
    }

    #[tokio::test]
    async fn load_creates_counter_at_zero() {
        let (gate, _, usage) = gate_with(None).await;
        assert_eq!(gate.usage_count(), 0);
        assert_eq!(usage.count("f1"), Some(0));
        assert_eq!(gate.plan_state(), PlanState::PlanUnset);
    }

    #[tokio::test]
    async fn load_without_profile_fails() {
        let profiles = Arc::new(MemoryProfileStore::new());
        let usage = Arc::new(MemoryUsageStore::new());
        let err = FreemiumGate::load("ghost", profiles, usage).await.err().unwrap();
        assert_eq!(err, GateError::ProfileMissing { id: "ghost".to_string() });
    }

    #[tokio::test]
    async fn free_plan_allows_one_action_then_denies() {
        let (mut gate, _, _) = gate_with(Some(Plan::Free)).await;

        assert_eq!(gate.attempt_gated_action(), GateDecision::Permitted);
        assert_eq!(gate.record_usage().await.unwrap(), 1);
        assert_eq!(
            gate.attempt_gated_action(),
            GateDecision::Denied(DenialReason::QuotaExceeded)
        );
        assert_eq!(gate.remaining_free_actions(), Some(0));
    }

    #[tokio::test]
    async fn upgrade_lifts_quota_for_good() {
        let (mut gate, profiles, _) = gate_with(Some(Plan::Free)).await;
        gate.record_usage().await.unwrap();

        assert_eq!(gate.upgrade().await.unwrap(), PlanState::PlanPremium);
        assert_eq!(gate.attempt_gated_action(), GateDecision::Permitted);
        assert_eq!(profiles.snapshot("f1").unwrap().plan, Some(Plan::Premium));

        // Premium usage is not metered
        assert_eq!(gate.record_usage().await.unwrap(), 1);
        assert_eq!(gate.attempt_gated_action(), GateDecision::Permitted);
    }

    #[tokio::test]
    async fn unset_plan_denies_and_select_persists() {
        let (mut gate, profiles, _) = gate_with(None).await;
        assert_eq!(
            gate.attempt_gated_action(),
            GateDecision::Denied(DenialReason::PlanNotSelected)
        );
        assert_eq!(gate.record_usage().await.unwrap_err(), GateError::PlanNotSelected);

        assert_eq!(gate.select_plan(Plan::Free).await.unwrap(), PlanState::PlanFree);
        assert_eq!(profiles.snapshot("f1").unwrap().plan, Some(Plan::Free));
        assert_eq!(gate.attempt_gated_action(), GateDecision::Permitted);
    }

    #[tokio::test]
    async fn reselecting_same_plan_is_noop_but_switching_is_refused() {
        let (mut gate, profiles, _) = gate_with(Some(Plan::Premium)).await;
        let writes = profiles.update_count();

        assert_eq!(
            gate.select_plan(Plan::Premium).await.unwrap(),
            PlanState::PlanPremium
        );
        assert_eq!(profiles.update_count(), writes);

        assert_eq!(
            gate.select_plan(Plan::Free).await.unwrap_err(),
            GateError::PlanAlreadySelected {
                current: Plan::Premium
            }
        );
        assert_eq!(gate.plan(), Some(Plan::Premium));
    }

    #[tokio::test]
    async fn failed_plan_write_keeps_plan_unset() {
        let (mut gate, profiles, _) = gate_with(None).await;
        profiles.fail_next_write(StoreError::Unavailable("offline".to_string()));

        let err = gate.select_plan(Plan::Free).await.unwrap_err();
        assert!(matches!(err, GateError::PersistenceFailure(_)));
        assert_eq!(gate.plan_state(), PlanState::PlanUnset);

        assert_eq!(gate.select_plan(Plan::Free).await.unwrap(), PlanState::PlanFree);
    }

    #[tokio::test]
    async fn failed_usage_write_is_surfaced() {
        let (mut gate, _, usage) = gate_with(Some(Plan::Free)).await;
        usage.fail_next_increment(StoreError::Unavailable("offline".to_string()));

        let err = gate.record_usage().await.unwrap_err();
        assert!(matches!(err, GateError::PersistenceFailure(_)));
        assert_eq!(gate.usage_count(), 0);
        assert_eq!(gate.attempt_gated_action(), GateDecision::Permitted);
    }

    #[tokio::test]
    async fn counter_survives_reload() {
        let (mut gate, profiles, usage) = gate_with(Some(Plan::Free)).await;
        gate.record_usage().await.unwrap();

        let reloaded = FreemiumGate::load("f1", profiles, usage).await.unwrap();
        assert_eq!(reloaded.usage_count(), 1);
        assert_eq!(
            reloaded.attempt_gated_action(),
            GateDecision::Denied(DenialReason::QuotaExceeded)
        );
    }
}
