use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::api::cluster_status_dto::{CellStateDto, ChainStatusDto, ClusterStatusDto, PhysicalCellStatusDto, VirtualCellStatusDto, VirtualClusterStatusDto};
use crate::api::scheduler_config_dto::ClusterConfigDto;
use crate::domain::allocation::allocation::AllocationId;
use crate::domain::allocation::allocation_tracker::AllocationTracker;
use crate::domain::allocation::occupancy::{Occupant, OccupancySnapshot};
use crate::domain::clock::clock::SharedClock;
use crate::domain::placement::placement_tree::{PhysicalPlacementView, PodSlot};
use crate::domain::placement::search_engine::{Placement, PlacementSearchEngine, SearchOutcome};
use crate::domain::preemption::lazy_preemption::LazyPreemptionStatus;
use crate::domain::preemption::preemption_engine::{PreemptionEngine, PreemptionPlan};
use crate::domain::request::priority::CellPriority;
use crate::domain::request::scheduling_request::PodGroupSchedulingRequest;
use crate::domain::reservation::reservation_map::{ReservationMap, reserved_by_index};
use crate::domain::scheduler::analytics;
use crate::domain::scheduler::pod_group_state::PodGroupState;
use crate::domain::scheduler::scheduler_config::SchedulerConfig;
use crate::domain::scheduler::scheduling_status::PodGroupSchedulingStatus;
use crate::domain::topology::{cell::CellId, cell_store::CellStore};
use crate::domain::utils::id::{CellAddress, PodGroupName, PodUid, VirtualClusterName};
use crate::error::{Error, Result};

/// What one `reconcile` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Victims whose grace period ran out.
    pub forced_releases: Vec<PodGroupName>,
    /// Waiting preemptors that got their cells.
    pub admitted: Vec<PodGroupName>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.forced_releases.is_empty() && self.admitted.is_empty()
    }
}

/// Entry point of the scheduling core: drives every pod group through its lifecycle.
///
/// Searches run on tracker snapshots and are side-effect free; only `commit`/`release` on the
/// tracker change occupancy. All mutation of statuses goes through `&mut self`, so one scheduler
/// is one scheduling authority.
#[derive(Debug)]
pub struct Scheduler {
    store: Arc<CellStore>,
    reservations: Arc<ReservationMap>,
    config: SchedulerConfig,
    tracker: AllocationTracker,
    preemption: PreemptionEngine,
    clock: SharedClock,

    statuses: BTreeMap<PodGroupName, PodGroupSchedulingStatus>,
    requests: HashMap<PodGroupName, PodGroupSchedulingRequest>,
}

impl Scheduler {
    pub fn new(store: CellStore, reservations: ReservationMap, config: SchedulerConfig, clock: SharedClock) -> Self {
        let store = Arc::new(store);
        Scheduler {
            tracker: AllocationTracker::new(store.clone()),
            store,
            reservations: Arc::new(reservations),
            preemption: PreemptionEngine::new(config.grace_period_seconds),
            config,
            clock,
            statuses: BTreeMap::new(),
            requests: HashMap::new(),
        }
    }

    pub fn from_dto(dto: &ClusterConfigDto, clock: SharedClock) -> Result<Self> {
        let store = CellStore::from_dto(&dto.physical_cluster)?;
        log::info!("Built {} cells on {} chain(s).", store.len(), store.chains().count());

        let reservations = ReservationMap::build(&store, &dto.virtual_clusters)?;
        let config = SchedulerConfig::from_dto(&dto.scheduler);
        log::info!("Scheduler ready: grace period {}s, ordering {:?}.", config.grace_period_seconds, config.candidate_ordering);

        Ok(Scheduler::new(store, reservations, config, clock))
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn store(&self) -> &CellStore {
        &self.store
    }

    pub fn reservations(&self) -> &ReservationMap {
        &self.reservations
    }

    pub fn tracker(&self) -> &AllocationTracker {
        &self.tracker
    }

    fn now(&self) -> i64 {
        self.clock.now_in_s()
    }

    // --- Scheduling ---

    /// Schedules `request` and returns the resulting status.
    ///
    /// Infeasible requests are not errors: the status says `Infeasible` and carries the reason.
    /// Scheduling a group that already holds cells returns its status unchanged.
    ///
    /// # Returns
    /// `ConfigMismatch` if the request references unknown configuration; nothing is recorded then.
    pub fn schedule(&mut self, request: PodGroupSchedulingRequest) -> Result<PodGroupSchedulingStatus> {
        let name = request.name();
        let now = self.now();
        PlacementSearchEngine::new(&self.store, &self.reservations, self.config.search_config()).validate(&request)?;

        match self.statuses.get_mut(&name) {
            Some(status) if status.state.holds_cells() => {
                log::debug!("{} is already {}, nothing to schedule.", name, status.state);
                return self.status(&name).ok_or_else(|| Error::UnknownPodGroup(name.to_string()));
            }
            Some(status) if matches!(status.state, PodGroupState::Infeasible | PodGroupState::Released) => status.resubmit(&request, now)?,
            Some(status) => status.refresh_request(&request, now),
            None => {
                self.statuses.insert(name.clone(), PodGroupSchedulingStatus::new(&request, now));
            }
        }
        log::info!("Scheduling {} for {} on chain {} at priority {}.", name, request.virtual_cluster, request.chain, request.priority);
        self.requests.insert(name.clone(), request);

        self.evaluate(&name)?;

        let lapsed = self.statuses.get(&name).is_some_and(|s| s.state == PodGroupState::PreemptionPending && s.preemption_deadline.is_some_and(|d| d <= now));
        if lapsed {
            self.reconcile()?;
        }
        self.status(&name).ok_or_else(|| Error::UnknownPodGroup(name.to_string()))
    }

    /// One search round for a `Pending` or `PreemptionPending` group.
    fn evaluate(&mut self, name: &PodGroupName) -> Result<()> {
        let request = self.requests.get(name).cloned().ok_or_else(|| Error::UnknownPodGroup(name.to_string()))?;
        self.transition(name, PodGroupState::Searching)?;

        let store = self.store.clone();
        let reservations = self.reservations.clone();
        let engine = PlacementSearchEngine::new(&store, &reservations, self.config.search_config());

        let mut conflicts = 0;
        loop {
            let snapshot = self.tracker.snapshot();
            let outcome = match engine.search(&request, &snapshot) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.on_infeasible(name, e.to_string())?;
                    return Err(e);
                }
            };

            match outcome {
                SearchOutcome::Placed(placement) => match self.tracker.commit(&request, placement.clone()) {
                    Ok(id) => return self.on_allocated(name, id, &placement),
                    Err(Error::CommitConflict { cell }) if conflicts < self.config.max_commit_retries => {
                        conflicts += 1;
                        log::warn!("Commit of {} conflicted on {}, retrying ({}/{}).", name, cell, conflicts, self.config.max_commit_retries);
                    }
                    Err(Error::CommitConflict { cell }) => {
                        return self.on_infeasible(name, format!("gave up after {} commit conflicts, last on cell {}", conflicts, cell));
                    }
                    Err(e) => {
                        self.on_infeasible(name, e.to_string())?;
                        return Err(e);
                    }
                },
                SearchOutcome::PreemptionRequired { placement, blockers } => {
                    return match self.preemption.plan(&engine, &request, &snapshot, placement, &blockers, self.now()) {
                        Ok(plan) => self.on_preemption_required(name, plan),
                        Err(Error::Infeasible(reason)) => self.on_infeasible(name, reason),
                        Err(e) => {
                            self.on_infeasible(name, e.to_string())?;
                            Err(e)
                        }
                    };
                }
                SearchOutcome::Infeasible(reason) => return self.on_infeasible(name, reason),
            }
        }
    }

    fn on_allocated(&mut self, name: &PodGroupName, id: AllocationId, placement: &Placement) -> Result<()> {
        self.withdraw_marks(name, &BTreeSet::new())?;
        let now = self.now();
        let physical = placement.physical_view(&self.store);
        let virtual_placement = placement.virtual_view(&self.reservations);
        let leaf_count = placement.leaf_number(&self.store);

        let status = self.status_mut(name)?;
        status.transition_to(PodGroupState::Allocated, now)?;
        status.allocation = Some(id);
        status.scope = Some(placement.scope);
        status.physical_placement = Some(physical);
        status.virtual_placement = Some(virtual_placement);
        status.victims.clear();
        status.preemption_deadline = None;
        status.infeasible_reason = None;

        log::info!("{} allocated on {} cell(s) ({:?}).", name, placement.cells().len(), placement.scope);
        analytics::log_placed(status, placement.cells().len(), leaf_count, now);
        Ok(())
    }

    fn on_infeasible(&mut self, name: &PodGroupName, reason: String) -> Result<()> {
        self.withdraw_marks(name, &BTreeSet::new())?;
        let now = self.now();
        let status = self.status_mut(name)?;
        status.transition_to(PodGroupState::Infeasible, now)?;
        status.clear_placement();
        status.victims.clear();
        status.preemption_deadline = None;
        log::info!("{} is infeasible: {}", name, reason);
        status.infeasible_reason = Some(reason);
        analytics::log_infeasible(status, now);
        Ok(())
    }

    /// Marks the victims of `plan` and parks `name` on the placement it gets once they are gone.
    fn on_preemption_required(&mut self, name: &PodGroupName, plan: PreemptionPlan) -> Result<()> {
        let now = self.now();
        let wanted: BTreeSet<PodGroupName> = plan.victims.iter().map(|v| v.group.clone()).collect();
        self.withdraw_marks(name, &wanted)?;

        let mut deadline = now;
        for victim in &plan.victims {
            let Some(victim_status) = self.statuses.get_mut(&victim.group) else {
                log::warn!("Victim {} of {} has no status, skipping.", victim.group, name);
                continue;
            };
            if victim_status.allocation != Some(victim.allocation) {
                log::warn!("Victim {} of {} changed allocation since the search, skipping.", victim.group, name);
                continue;
            }

            match victim_status.state {
                PodGroupState::Allocated => {
                    victim_status.transition_to(PodGroupState::PreemptionVictim, now)?;
                    let lazy = LazyPreemptionStatus::new(name.clone(), now, plan.deadline);
                    let victim_deadline = lazy.deadline;
                    victim_status.lazy_preemption = Some(lazy);
                    victim_status.pods_under_preemption = self.tracker.pod_group(&victim.group).map(|g| g.bound_pods().into_iter().map(|(_, p)| p.uid.clone()).collect()).unwrap_or_default();
                    victim_status.transition_to(PodGroupState::GracePeriod, now)?;

                    log::info!("{} marked for preemption by {}, grace period ends at {}.", victim.group, name, victim_deadline);
                    analytics::log_victim_marked(victim_status, name, victim_deadline, now);
                    deadline = deadline.max(victim_deadline);
                }
                PodGroupState::PreemptionVictim | PodGroupState::GracePeriod => {
                    if let Some(lazy) = victim_status.lazy_preemption.as_mut() {
                        lazy.add_preemptor(name.clone());
                        deadline = deadline.max(lazy.deadline);
                    }
                }
                other => log::warn!("Victim {} of {} is {}, not marking it.", victim.group, name, other),
            }
        }

        let physical = plan.placement.physical_view(&self.store);
        let virtual_placement = plan.placement.virtual_view(&self.reservations);
        let status = self.status_mut(name)?;
        status.transition_to(PodGroupState::PreemptionPending, now)?;
        status.scope = Some(plan.placement.scope);
        status.physical_placement = Some(physical);
        status.virtual_placement = Some(virtual_placement);
        status.victims = plan.victims;
        status.preemption_deadline = Some(deadline);
        status.infeasible_reason = None;
        log::info!("{} waits for {} victim(s) until {}.", name, status.victims.len(), deadline);
        analytics::log_preemption_required(status, now);
        Ok(())
    }

    /// Removes `preemptor` from every victim it no longer needs. Victims left without any
    /// preemptor go back to `Allocated`.
    fn withdraw_marks(&mut self, preemptor: &PodGroupName, keep: &BTreeSet<PodGroupName>) -> Result<()> {
        let now = self.now();
        for status in self.statuses.values_mut() {
            if keep.contains(&status.group) {
                continue;
            }
            let Some(lazy) = status.lazy_preemption.as_mut() else { continue };
            if !lazy.preemptors.contains(preemptor) {
                continue;
            }
            if lazy.remove_preemptor(preemptor) {
                status.lazy_preemption = None;
                status.pods_under_preemption.clear();
                status.transition_to(PodGroupState::Allocated, now)?;
                log::info!("Preemption of {} cancelled, {} no longer needs it.", status.group, preemptor);
                analytics::log_preemption_cancelled(status, now);
            }
        }
        Ok(())
    }

    // --- Release ---

    /// Releases or withdraws `group`.
    ///
    /// A running group frees its cells. A waiting group is withdrawn; victims only it was waiting
    /// for keep running.
    pub fn release(&mut self, group: &PodGroupName) -> Result<PodGroupSchedulingStatus> {
        let state = self.statuses.get(group).map(|s| s.state).ok_or_else(|| Error::UnknownPodGroup(group.to_string()))?;

        match state {
            PodGroupState::Allocated | PodGroupState::PreemptionVictim | PodGroupState::GracePeriod => {
                let admitted = self.release_allocation(group)?;
                if !admitted.is_empty() {
                    log::info!("{} drained, admitted {:?}.", group, admitted);
                }
            }
            state if state.is_waiting() || state == PodGroupState::Infeasible => {
                self.withdraw_marks(group, &BTreeSet::new())?;
                let now = self.now();
                let status = self.status_mut(group)?;
                status.transition_to(PodGroupState::Released, now)?;
                status.clear_placement();
                status.victims.clear();
                status.preemption_deadline = None;
                log::info!("{} withdrawn while {}.", group, state);
                analytics::log_released(status, now);
            }
            _ => log::debug!("{} is already {}.", group, state),
        }
        self.status(group).ok_or_else(|| Error::UnknownPodGroup(group.to_string()))
    }

    /// Frees the cells of `group`. Preemptors that were waiting for it get their search round right
    /// away, before any later request can take the freed cells.
    ///
    /// # Returns
    /// The preemptors that got their cells.
    fn release_allocation(&mut self, group: &PodGroupName) -> Result<Vec<PodGroupName>> {
        let now = self.now();
        let (allocation, preemptors) = {
            let status = self.status_mut(group)?;
            status.transition_to(PodGroupState::Releasing, now)?;
            (status.allocation, status.lazy_preemption.as_ref().map(|lazy| lazy.preemptors.clone()).unwrap_or_default())
        };

        match allocation {
            Some(id) => {
                self.tracker.release(id)?;
            }
            None => log::warn!("{} was releasing without a tracked allocation.", group),
        }

        let status = self.status_mut(group)?;
        status.clear_placement();
        status.transition_to(PodGroupState::Released, now)?;
        log::info!("{} released.", group);
        analytics::log_released(status, now);

        Ok(self.admit_waiting(preemptors))
    }

    /// Gives every `PreemptionPending` group among `groups` a search round, highest priority first.
    ///
    /// # Returns
    /// The groups that got their cells.
    fn admit_waiting(&mut self, groups: impl IntoIterator<Item = PodGroupName>) -> Vec<PodGroupName> {
        let mut waiting: Vec<(Reverse<CellPriority>, PodGroupName)> = groups
            .into_iter()
            .filter_map(|group| self.statuses.get(&group).filter(|s| s.state == PodGroupState::PreemptionPending).map(|s| (Reverse(s.priority), group)))
            .collect();
        waiting.sort();

        let mut admitted = Vec::new();
        for (_, group) in waiting {
            if let Err(e) = self.evaluate(&group) {
                log::error!("Re-evaluating {} failed: {}", group, e);
                continue;
            }
            if self.statuses.get(&group).is_some_and(|s| s.state == PodGroupState::Allocated) {
                admitted.push(group);
            }
        }
        admitted
    }

    // --- Pods ---

    /// Records that pod `uid` of `group` now runs on `leaf_cells`.
    pub fn bind_pod(&mut self, group: &PodGroupName, uid: &PodUid, leaf_cells: &[CellAddress]) -> Result<PodSlot> {
        let state = self.statuses.get(group).map(|s| s.state).ok_or_else(|| Error::UnknownPodGroup(group.to_string()))?;
        if !matches!(state, PodGroupState::Allocated | PodGroupState::PreemptionVictim | PodGroupState::GracePeriod) {
            return Err(Error::PodBindingMismatch(format!("{} is {} and has no cells to bind pod {} to", group, state, uid)));
        }
        self.tracker.bind_pod(group, uid, leaf_cells)
    }

    // --- Reconciliation ---

    /// Forces release of victims whose grace period has lapsed, then gives every waiting preemptor
    /// another search round, highest priority first.
    pub fn reconcile(&mut self) -> Result<ReconcileReport> {
        let now = self.now();
        let mut report = ReconcileReport::default();

        let expired: Vec<(PodGroupName, i64)> = self
            .statuses
            .values()
            .filter(|s| s.state == PodGroupState::GracePeriod)
            .filter_map(|s| s.lazy_preemption.as_ref().filter(|lazy| lazy.is_expired(now)).map(|lazy| (s.group.clone(), lazy.deadline)))
            .collect();

        for (group, deadline) in expired {
            // An earlier release in this loop may have admitted the preemptor and lifted the mark.
            if self.statuses.get(&group).is_none_or(|s| s.state != PodGroupState::GracePeriod) {
                continue;
            }
            log::warn!("PreemptionTimeout: {} did not drain before {}, releasing it by force.", group, deadline);
            if let Some(status) = self.statuses.get(&group) {
                analytics::log_forced_release(status, deadline, now);
            }
            let admitted = self.release_allocation(&group)?;
            report.forced_releases.push(group);
            report.admitted.extend(admitted);
        }

        let waiting: Vec<PodGroupName> = self.statuses.values().filter(|s| s.state == PodGroupState::PreemptionPending).map(|s| s.group.clone()).collect();
        let admitted = self.admit_waiting(waiting);
        report.admitted.extend(admitted);

        if !report.is_empty() {
            log::info!("Reconciled: {} forced release(s), {} admitted.", report.forced_releases.len(), report.admitted.len());
        }
        Ok(report)
    }

    // --- Restart ---

    /// Re-admits a group that is known to be running on `physical`, without searching.
    ///
    /// # Returns
    /// `ConfigMismatch` if the placement does not fit the request, `AlreadyAllocated` if the group
    /// already holds cells, `CommitConflict` if the cells are taken by another group.
    pub fn restore(&mut self, request: PodGroupSchedulingRequest, physical: &PhysicalPlacementView) -> Result<PodGroupSchedulingStatus> {
        let name = request.name();
        if self.statuses.get(&name).is_some_and(|s| !matches!(s.state, PodGroupState::Infeasible | PodGroupState::Released)) {
            return Err(Error::AlreadyAllocated(name.to_string()));
        }

        let placement = PlacementSearchEngine::new(&self.store, &self.reservations, self.config.search_config()).placement_from_physical(&request, physical)?;
        let id = self.tracker.commit(&request, placement.clone())?;

        let now = self.now();
        let mut status = PodGroupSchedulingStatus::new(&request, now);
        status.transition_to(PodGroupState::Searching, now)?;
        status.transition_to(PodGroupState::Allocated, now)?;
        status.allocation = Some(id);
        status.scope = Some(placement.scope);
        status.physical_placement = Some(placement.physical_view(&self.store));
        status.virtual_placement = Some(placement.virtual_view(&self.reservations));

        log::info!("Restored {} on {} cell(s).", name, placement.cells().len());
        analytics::log_restored(&status, placement.cells().len(), now);

        self.statuses.insert(name.clone(), status);
        self.requests.insert(name.clone(), request);
        self.status(&name).ok_or_else(|| Error::UnknownPodGroup(name.to_string()))
    }

    // --- Views ---

    /// Current status of `group`, with the bound pods read from the tracker.
    pub fn status(&self, group: &PodGroupName) -> Option<PodGroupSchedulingStatus> {
        let mut status = self.statuses.get(group)?.clone();
        if status.state.holds_cells() {
            status.allocated_pod_group = self.tracker.pod_group(group);
        }
        Some(status)
    }

    pub fn statuses(&self) -> impl Iterator<Item = &PodGroupSchedulingStatus> {
        self.statuses.values()
    }

    /// Every physical cell with its occupancy and reservation owner, chain by chain in pre-order.
    pub fn cluster_status(&self) -> ClusterStatusDto {
        let snapshot = self.tracker.snapshot();
        let reserved_by = reserved_by_index(&self.reservations, &self.store);

        let chains = self
            .store
            .chains()
            .map(|chain| {
                let cells = self
                    .store
                    .top_cells(&chain.name)
                    .iter()
                    .flat_map(|&top| self.store.subtree(top))
                    .map(|cell| {
                        let physical = self.store.cell(cell);
                        let (occupant_group, occupant_priority) = self.occupant_view(&snapshot, cell);
                        PhysicalCellStatusDto {
                            cell_address: physical.address.to_string(),
                            cell_type: physical.cell_type.to_string(),
                            level: physical.level.0,
                            state: cell_state(&snapshot, cell, physical.leaf_number),
                            used_leaf_cells: snapshot.occupancy().used_leaves(cell),
                            total_leaf_cells: physical.leaf_number,
                            occupant_group,
                            occupant_priority,
                            reserved_by: reserved_by.get(&cell).map(|vc| vc.to_string()),
                        }
                    })
                    .collect();
                ChainStatusDto { chain: chain.name.to_string(), cells }
            })
            .collect();

        ClusterStatusDto { chains }
    }

    /// The reserved and pinned cells of `vc` in tenant coordinates.
    pub fn virtual_cluster_status(&self, vc: &VirtualClusterName) -> Result<VirtualClusterStatusDto> {
        let reservation = self.reservations.virtual_cluster(vc).ok_or_else(|| Error::ConfigMismatch(format!("Unknown virtual cluster {}", vc)))?;
        let snapshot = self.tracker.snapshot();

        let roots = reservation.reserved_roots().chain(reservation.pinned_roots().map(|(_, root)| root));
        let cells = roots
            .flat_map(|root| self.reservations.virtual_subtree(root))
            .map(|id| {
                let virtual_cell = self.reservations.virtual_cell(id);
                let physical = self.store.cell(virtual_cell.physical);
                let (occupant_group, occupant_priority) = self.occupant_view(&snapshot, virtual_cell.physical);
                VirtualCellStatusDto {
                    virtual_address: virtual_cell.address.to_string(),
                    physical_address: physical.address.to_string(),
                    cell_type: physical.cell_type.to_string(),
                    level: virtual_cell.level.0,
                    pinned_cell_id: virtual_cell.pinned_cell_id.as_ref().map(|p| p.to_string()),
                    state: cell_state(&snapshot, virtual_cell.physical, physical.leaf_number),
                    occupant_group,
                    occupant_priority,
                }
            })
            .collect();

        Ok(VirtualClusterStatusDto { name: vc.to_string(), cells })
    }

    fn occupant_view(&self, snapshot: &OccupancySnapshot, cell: CellId) -> (Option<String>, Option<i32>) {
        match snapshot.occupancy().occupant(cell) {
            Some(Occupant::Allocation(id)) => snapshot.allocation(id).map_or((None, None), |a| (Some(a.group.to_string()), Some(a.priority.0))),
            _ => (None, None),
        }
    }

    // --- Helpers ---

    fn status_mut(&mut self, group: &PodGroupName) -> Result<&mut PodGroupSchedulingStatus> {
        self.statuses.get_mut(group).ok_or_else(|| Error::UnknownPodGroup(group.to_string()))
    }

    fn transition(&mut self, group: &PodGroupName, next: PodGroupState) -> Result<()> {
        let now = self.now();
        self.status_mut(group)?.transition_to(next, now)
    }
}

fn cell_state(snapshot: &OccupancySnapshot, cell: CellId, leaf_number: u32) -> CellStateDto {
    match snapshot.occupancy().used_leaves(cell) {
        0 => CellStateDto::Free,
        used if used >= leaf_number => CellStateDto::Used,
        _ => CellStateDto::Partial,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::clock_mock::MockClock;
    use crate::domain::request::pod_group_spec::PodGroupSpec;
    use crate::domain::test_fixtures::{rack_cluster_config, small_cluster_config};
    use tracing_test::traced_test;

    fn scheduler(config: ClusterConfigDto) -> (Scheduler, MockClock) {
        let clock = MockClock::new(1_000);
        let scheduler = Scheduler::from_dto(&config, Arc::new(clock.clone())).unwrap();
        (scheduler, clock)
    }

    fn gpus(vc: &str, name: &str, priority: i32, count: u32) -> PodGroupSchedulingRequest {
        PodGroupSchedulingRequest::new(vc, "NODE", priority, PodGroupSpec::uniform(name, 1, "GPU", count))
    }

    #[test]
    fn lower_priority_cannot_preempt_and_higher_priority_waits_for_grace() {
        let (mut scheduler, clock) = scheduler(small_cluster_config());

        assert_eq!(scheduler.schedule(gpus("b", "filler", 10, 2)).unwrap().state, PodGroupState::Allocated);
        let a = scheduler.schedule(gpus("a", "tenant-a", 5, 2)).unwrap();
        assert_eq!(a.state, PodGroupState::Allocated);
        assert_eq!(a.scope, Some(crate::domain::placement::strategy::SearchScope::Reserved));

        let weak = scheduler.schedule(gpus("b", "weak", 3, 2)).unwrap();
        assert_eq!(weak.state, PodGroupState::Infeasible);
        assert_eq!(scheduler.status(&a.group).unwrap().state, PodGroupState::Allocated);

        let strong = scheduler.schedule(gpus("b", "strong", 8, 2)).unwrap();
        assert_eq!(strong.state, PodGroupState::PreemptionPending);
        assert_eq!(strong.preemption_deadline, Some(1_030));

        let victim = scheduler.status(&a.group).unwrap();
        assert_eq!(victim.state, PodGroupState::GracePeriod);
        assert_eq!(victim.lazy_preemption.as_ref().unwrap().preemptors, BTreeSet::from([strong.group.clone()]));

        clock.advance(29);
        assert!(scheduler.reconcile().unwrap().is_empty());
        assert_eq!(scheduler.status(&a.group).unwrap().state, PodGroupState::GracePeriod);

        clock.advance(1);
        let report = scheduler.reconcile().unwrap();
        assert_eq!(report.forced_releases, vec![a.group.clone()]);
        assert_eq!(report.admitted, vec![strong.group.clone()]);
        assert_eq!(scheduler.status(&a.group).unwrap().state, PodGroupState::Released);
        assert_eq!(scheduler.status(&strong.group).unwrap().state, PodGroupState::Allocated);
    }

    #[test]
    fn withdrawing_the_preemptor_cancels_the_preemption() {
        let (mut scheduler, _clock) = scheduler(small_cluster_config());
        scheduler.schedule(gpus("b", "filler", 10, 2)).unwrap();
        let a = scheduler.schedule(gpus("a", "tenant-a", 5, 2)).unwrap();
        let strong = scheduler.schedule(gpus("b", "strong", 8, 2)).unwrap();

        let withdrawn = scheduler.release(&strong.group).unwrap();
        assert_eq!(withdrawn.state, PodGroupState::Released);

        let victim = scheduler.status(&a.group).unwrap();
        assert_eq!(victim.state, PodGroupState::Allocated);
        assert!(victim.lazy_preemption.is_none());
    }

    #[test]
    fn zero_grace_period_preempts_inline() {
        let mut config = small_cluster_config();
        config.scheduler.grace_period_seconds = 0;
        let (mut scheduler, _clock) = scheduler(config);

        scheduler.schedule(gpus("b", "filler", 10, 2)).unwrap();
        let a = scheduler.schedule(gpus("a", "tenant-a", 5, 2)).unwrap();
        let strong = scheduler.schedule(gpus("b", "strong", 8, 2)).unwrap();

        assert_eq!(strong.state, PodGroupState::Allocated);
        assert_eq!(scheduler.status(&a.group).unwrap().state, PodGroupState::Released);
    }

    #[test]
    fn a_drained_victim_hands_its_cells_to_the_preemptor_at_once() {
        let (mut scheduler, _clock) = scheduler(small_cluster_config());
        scheduler.schedule(gpus("b", "filler", 10, 2)).unwrap();
        let a = scheduler.schedule(gpus("a", "tenant-a", 5, 2)).unwrap();
        let strong = scheduler.schedule(gpus("b", "strong", 8, 2)).unwrap();
        let cells = |status: &PodGroupSchedulingStatus| -> Vec<CellAddress> { status.physical_placement.as_ref().unwrap().cells().into_iter().cloned().collect() };
        assert_eq!(cells(&strong), cells(&a));

        scheduler.release(&a.group).unwrap();
        let admitted = scheduler.status(&strong.group).unwrap();
        assert_eq!(admitted.state, PodGroupState::Allocated);
        assert_eq!(cells(&admitted), cells(&a));

        // A request arriving right after the drain finds nothing it may take.
        let late = scheduler.schedule(gpus("b", "late", 8, 2)).unwrap();
        assert_eq!(late.state, PodGroupState::Infeasible);
        assert!(scheduler.reconcile().unwrap().is_empty());
    }

    #[test]
    fn a_waiting_group_takes_over_its_changed_request() {
        let (mut scheduler, _clock) = scheduler(small_cluster_config());
        scheduler.schedule(gpus("b", "filler", 10, 2)).unwrap();
        scheduler.schedule(gpus("a", "tenant-a", 5, 2)).unwrap();
        let strong = scheduler.schedule(gpus("b", "strong", 8, 2)).unwrap();
        assert_eq!(strong.state, PodGroupState::PreemptionPending);

        let raised = scheduler.schedule(gpus("b", "strong", 9, 2)).unwrap();
        assert_eq!(raised.state, PodGroupState::PreemptionPending);
        assert_eq!(raised.priority, crate::domain::request::priority::CellPriority(9));

        // Dropping below the victim ends the wait instead of keeping the stale priority.
        let lowered = scheduler.schedule(gpus("b", "strong", 4, 2)).unwrap();
        assert_eq!(lowered.state, PodGroupState::Infeasible);
        assert_eq!(lowered.priority, crate::domain::request::priority::CellPriority(4));
        assert_eq!(scheduler.status(&PodGroupName::new("tenant-a")).unwrap().state, PodGroupState::Allocated);
    }

    #[test]
    fn scheduling_an_allocated_group_again_changes_nothing() {
        let (mut scheduler, _clock) = scheduler(small_cluster_config());
        let first = scheduler.schedule(gpus("a", "job", 5, 1)).unwrap();
        let second = scheduler.schedule(gpus("a", "job", 5, 1)).unwrap();

        assert_eq!(first.physical_placement, second.physical_placement);
        assert_eq!(scheduler.tracker().len(), 1);
    }

    #[test]
    fn infeasible_groups_can_be_resubmitted() {
        let (mut scheduler, _clock) = scheduler(small_cluster_config());
        scheduler.schedule(gpus("b", "big", 10, 4)).unwrap();

        let blocked = scheduler.schedule(gpus("a", "late", 5, 1)).unwrap();
        assert_eq!(blocked.state, PodGroupState::Infeasible);
        assert!(blocked.infeasible_reason.is_some());

        scheduler.release(&PodGroupName::new("big")).unwrap();
        assert_eq!(scheduler.schedule(gpus("a", "late", 5, 1)).unwrap().state, PodGroupState::Allocated);
    }

    #[test]
    fn config_mismatches_are_rejected_without_a_status() {
        let (mut scheduler, _clock) = scheduler(small_cluster_config());
        let err = scheduler.schedule(gpus("nobody", "ghost", 5, 1)).unwrap_err();
        assert!(matches!(err, Error::ConfigMismatch(_)));
        assert!(scheduler.status(&PodGroupName::new("ghost")).is_none());
    }

    #[test]
    fn released_groups_cannot_bind_pods() {
        let (mut scheduler, _clock) = scheduler(small_cluster_config());
        let status = scheduler.schedule(gpus("a", "job", 5, 1)).unwrap();
        let leaf = status.physical_placement.as_ref().unwrap().pods[0][0].clone();

        scheduler.bind_pod(&status.group, &PodUid::new("pod-0"), std::slice::from_ref(&leaf)).unwrap();
        assert!(scheduler.status(&status.group).unwrap().allocated_pod_group.unwrap().is_fully_bound());

        scheduler.release(&status.group).unwrap();
        assert!(matches!(scheduler.bind_pod(&status.group, &PodUid::new("pod-0"), &[leaf]), Err(Error::PodBindingMismatch(_))));
    }

    #[test]
    fn cluster_status_reports_usage_and_owners() {
        let (mut scheduler, _clock) = scheduler(rack_cluster_config());
        let request = PodGroupSchedulingRequest::new("b", "RACK", 4, PodGroupSpec::uniform("job", 1, "GPU", 1));
        scheduler.schedule(request).unwrap();

        let status = scheduler.cluster_status();
        let cells = &status.chains[0].cells;
        let rack = cells.iter().find(|c| c.cell_address == "rack0").unwrap();
        assert_eq!((rack.used_leaf_cells, rack.total_leaf_cells, rack.state), (1, 8, CellStateDto::Partial));

        let used_leaf = cells.iter().find(|c| c.level == 1 && c.state == CellStateDto::Used).unwrap();
        assert_eq!(used_leaf.occupant_group.as_deref(), Some("job"));
        assert_eq!(used_leaf.reserved_by.as_deref(), Some("b"));

        let pinned = scheduler.virtual_cluster_status(&VirtualClusterName::new("a")).unwrap();
        assert!(pinned.cells.iter().any(|c| c.pinned_cell_id.as_deref() == Some("pin-0")));
        assert!(matches!(scheduler.virtual_cluster_status(&VirtualClusterName::new("zz")), Err(Error::ConfigMismatch(_))));
    }

    #[test]
    fn restore_rebuilds_a_running_group() {
        let (mut scheduler, _clock) = scheduler(small_cluster_config());
        let view = PhysicalPlacementView { name: "job".to_string(), pods: vec![vec!["node0/1/0".into(), "node0/1/1".into()]], child_groups: Vec::new() };

        let status = scheduler.restore(gpus("b", "job", 4, 2), &view).unwrap();
        assert_eq!(status.state, PodGroupState::Allocated);

        assert!(matches!(scheduler.restore(gpus("b", "job", 4, 2), &view), Err(Error::AlreadyAllocated(_))));
        let twin = PhysicalPlacementView { name: "twin".to_string(), ..view };
        assert!(matches!(scheduler.restore(gpus("b", "twin", 4, 2), &twin), Err(Error::CommitConflict { .. })));
    }

    #[traced_test]
    #[test]
    fn decisions_are_emitted_as_analytics_events() {
        let (mut scheduler, _clock) = scheduler(small_cluster_config());
        scheduler.schedule(gpus("b", "filler", 10, 2)).unwrap();
        scheduler.schedule(gpus("a", "tenant-a", 5, 2)).unwrap();
        scheduler.schedule(gpus("b", "strong", 8, 2)).unwrap();

        assert!(logs_contain("Pod group placed"));
        assert!(logs_contain("Victim marked"));
        assert!(logs_contain("Preemption required"));
    }
}
