use serde::Serialize;
use std::collections::BTreeSet;

use crate::domain::allocation::allocated_pod_group::AllocatedPodGroup;
use crate::domain::allocation::allocation::AllocationId;
use crate::domain::placement::placement_tree::{PhysicalPlacementView, VirtualPlacementView};
use crate::domain::placement::strategy::SearchScope;
use crate::domain::preemption::lazy_preemption::LazyPreemptionStatus;
use crate::domain::preemption::preemption_engine::PreemptionVictim;
use crate::domain::request::priority::CellPriority;
use crate::domain::request::scheduling_request::PodGroupSchedulingRequest;
use crate::domain::scheduler::pod_group_state::PodGroupState;
use crate::domain::utils::id::{ChainName, PodGroupName, PodUid, VirtualClusterName};
use crate::error::{Error, Result};

/// Everything the scheduler knows about one pod group, as reported to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodGroupSchedulingStatus {
    pub group: PodGroupName,
    pub virtual_cluster: VirtualClusterName,
    pub chain: ChainName,
    pub priority: CellPriority,
    pub state: PodGroupState,

    pub scope: Option<SearchScope>,
    pub physical_placement: Option<PhysicalPlacementView>,
    pub virtual_placement: Option<VirtualPlacementView>,
    pub allocated_pod_group: Option<AllocatedPodGroup>,

    /// As a victim: the bound pods that will be evicted.
    pub pods_under_preemption: BTreeSet<PodUid>,
    /// As a victim: who wants the cells and the deadline.
    pub lazy_preemption: Option<LazyPreemptionStatus>,

    /// As a preemptor: the groups it waits for.
    pub victims: Vec<PreemptionVictim>,
    pub preemption_deadline: Option<i64>,

    pub infeasible_reason: Option<String>,
    pub updated_at: i64,

    #[serde(skip)]
    pub(crate) allocation: Option<AllocationId>,
}

impl PodGroupSchedulingStatus {
    pub fn new(request: &PodGroupSchedulingRequest, now: i64) -> Self {
        PodGroupSchedulingStatus {
            group: request.name(),
            virtual_cluster: request.virtual_cluster.clone(),
            chain: request.chain.clone(),
            priority: request.priority,
            state: PodGroupState::Pending,
            scope: None,
            physical_placement: None,
            virtual_placement: None,
            allocated_pod_group: None,
            pods_under_preemption: BTreeSet::new(),
            lazy_preemption: None,
            victims: Vec::new(),
            preemption_deadline: None,
            infeasible_reason: None,
            updated_at: now,
            allocation: None,
        }
    }

    /// Moves to `next` if the lifecycle allows it.
    pub fn transition_to(&mut self, next: PodGroupState, now: i64) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition { group: self.group.to_string(), from: self.state, to: next });
        }
        log::debug!("Pod group {}: {} -> {}", self.group, self.state, next);
        self.state = next;
        self.updated_at = now;
        Ok(())
    }

    /// Back to `Pending` with the (possibly changed) request, dropping all results of the previous round.
    pub fn resubmit(&mut self, request: &PodGroupSchedulingRequest, now: i64) -> Result<()> {
        self.transition_to(PodGroupState::Pending, now)?;
        self.virtual_cluster = request.virtual_cluster.clone();
        self.chain = request.chain.clone();
        self.priority = request.priority;
        self.clear_placement();
        self.victims.clear();
        self.preemption_deadline = None;
        self.infeasible_reason = None;
        Ok(())
    }

    /// Takes over a changed request of a group that is still waiting. Its next search round uses it.
    pub fn refresh_request(&mut self, request: &PodGroupSchedulingRequest, now: i64) {
        if self.virtual_cluster == request.virtual_cluster && self.chain == request.chain && self.priority == request.priority {
            return;
        }
        log::debug!("Pod group {} changed its request while {}.", self.group, self.state);
        self.virtual_cluster = request.virtual_cluster.clone();
        self.chain = request.chain.clone();
        self.priority = request.priority;
        self.updated_at = now;
    }

    pub(crate) fn clear_placement(&mut self) {
        self.scope = None;
        self.physical_placement = None;
        self.virtual_placement = None;
        self.allocated_pod_group = None;
        self.pods_under_preemption.clear();
        self.lazy_preemption = None;
        self.allocation = None;
    }
}
