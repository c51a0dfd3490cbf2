use std::collections::BTreeSet;

use crate::domain::allocation::allocation::AllocationId;
use crate::domain::allocation::occupancy::{Occupant, OccupancySnapshot};
use crate::domain::placement::candidate::{CandidateFacts, SearchConfig};
use crate::domain::placement::demand::{GroupDemand, PodDemand};
use crate::domain::placement::placement_tree::{PhysicalPlacement, PhysicalPlacementView, PodGroupPlacement, VirtualPlacement, VirtualPlacementView};
use crate::domain::placement::strategy::{SearchScope, SearchStrategy};
use crate::domain::request::priority::CellPriority;
use crate::domain::request::scheduling_request::PodGroupSchedulingRequest;
use crate::domain::reservation::reservation_map::ReservationMap;
use crate::domain::topology::cell::CellId;
use crate::domain::topology::cell_chain::CellLevel;
use crate::domain::topology::cell_store::CellStore;
use crate::domain::utils::id::VirtualClusterName;
use crate::error::{Error, Result};

/// A successful search result: the same tree in physical and in tenant coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub physical: PhysicalPlacement,
    /// `Some` only for cells inside the requesting tenant's own reservation.
    pub virtual_placement: VirtualPlacement,
    pub scope: SearchScope,
}

impl Placement {
    pub fn cells(&self) -> Vec<CellId> {
        self.physical.cells().into_iter().copied().collect()
    }

    pub fn leaf_number(&self, store: &CellStore) -> u32 {
        self.physical.cells().into_iter().map(|&c| store.cell(c).leaf_number).sum()
    }

    pub fn physical_view(&self, store: &CellStore) -> PhysicalPlacementView {
        self.physical.map(&|&c| store.address(c).clone())
    }

    pub fn virtual_view(&self, reservations: &ReservationMap) -> VirtualPlacementView {
        self.virtual_placement.map(&|v| v.map(|id| reservations.virtual_cell(id).address.clone()))
    }
}

#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Placed(Placement),
    /// Placeable only after evicting `blockers`, all of strictly lower priority.
    PreemptionRequired { placement: Placement, blockers: BTreeSet<AllocationId> },
    Infeasible(String),
}

/// Pure placement search. Never touches the tracker; works on a snapshot clone.
#[derive(Debug, Clone, Copy)]
pub struct PlacementSearchEngine<'a> {
    store: &'a CellStore,
    reservations: &'a ReservationMap,
    config: SearchConfig,
}

#[derive(Debug, Clone)]
struct SearchState {
    snapshot: OccupancySnapshot,
    blockers: BTreeSet<AllocationId>,
}

/// One scope of one pass: fixed universe, fixed eviction policy.
struct SearchPass<'e, 'a> {
    engine: &'e PlacementSearchEngine<'a>,
    universe: &'e [CellId],
    virtual_cluster: &'e VirtualClusterName,
    priority: CellPriority,
    allow_eviction: bool,
}

impl<'a> PlacementSearchEngine<'a> {
    pub fn new(store: &'a CellStore, reservations: &'a ReservationMap, config: SearchConfig) -> Self {
        PlacementSearchEngine { store, reservations, config }
    }

    /// Strategy and resolved demand of `request`, or the `ConfigMismatch` that rejects it.
    pub fn validate(&self, request: &PodGroupSchedulingRequest) -> Result<(SearchStrategy, GroupDemand)> {
        let strategy = SearchStrategy::select(request, self.store, self.reservations, self.config.allow_shared_fallback)?;
        let chain = self.store.chain(&request.chain).ok_or_else(|| Error::ConfigMismatch(format!("Unknown chain {}", request.chain)))?;
        let demand = GroupDemand::resolve(&request.pod_root_group, chain)?;
        Ok((strategy, demand))
    }

    /// Searches a placement for `request` against `snapshot`.
    ///
    /// The first pass only uses free cells. If that fails and the request is not opportunistic, a
    /// second pass also accepts cells held by strictly lower-priority allocations.
    pub fn search(&self, request: &PodGroupSchedulingRequest, snapshot: &OccupancySnapshot) -> Result<SearchOutcome> {
        let (strategy, demand) = self.validate(request)?;
        let scopes = strategy.scopes(self.store, request);

        for (scope, universe) in &scopes {
            if let Some((physical, _)) = self.run_pass(request, &demand, universe, snapshot.clone(), false) {
                log::debug!("Placed {} in scope {:?} without preemption", request.name(), scope);
                return Ok(SearchOutcome::Placed(self.placement(request, physical, *scope)));
            }
        }

        if request.priority > CellPriority::OPPORTUNISTIC {
            for (scope, universe) in &scopes {
                if let Some((physical, blockers)) = self.run_pass(request, &demand, universe, snapshot.clone(), true) {
                    let placement = self.placement(request, physical, *scope);
                    if blockers.is_empty() {
                        return Ok(SearchOutcome::Placed(placement));
                    }
                    log::debug!("Placing {} in scope {:?} requires evicting {} allocation(s)", request.name(), scope, blockers.len());
                    return Ok(SearchOutcome::PreemptionRequired { placement, blockers });
                }
            }
        }

        Ok(SearchOutcome::Infeasible(format!(
            "no cells on chain {} can host {} leaf cell(s) for {} at priority {} without evicting equal or higher priority work",
            request.chain,
            demand.leaf_number,
            request.name(),
            request.priority
        )))
    }

    /// Pass-one search with `victims` already gone from the snapshot.
    pub fn place_with_evictions(&self, request: &PodGroupSchedulingRequest, snapshot: &OccupancySnapshot, victims: &BTreeSet<AllocationId>) -> Result<Option<Placement>> {
        let (strategy, demand) = self.validate(request)?;
        let mut base = snapshot.clone();
        for &victim in victims {
            base.evict(self.store, victim);
        }

        for (scope, universe) in strategy.scopes(self.store, request) {
            if let Some((physical, _)) = self.run_pass(request, &demand, &universe, base.clone(), false) {
                return Ok(Some(self.placement(request, physical, scope)));
            }
        }
        Ok(None)
    }

    /// Rebuilds a placement for a live allocation known by cell addresses.
    ///
    /// # Returns
    /// `ConfigMismatch` if an address is unknown, a cell is on another chain, or the tree does not
    /// have the shape and cell levels the request asks for.
    pub fn placement_from_physical(&self, request: &PodGroupSchedulingRequest, view: &PhysicalPlacementView) -> Result<Placement> {
        let (strategy, demand) = self.validate(request)?;
        let physical = view.try_map(&|address| {
            self.store
                .find_by_address(address.as_str())
                .ok_or_else(|| Error::ConfigMismatch(format!("Unknown cell {} in placement of {}", address, request.name())))
        })?;
        self.check_shape(request, &demand, &physical)?;

        let scope = match strategy {
            SearchStrategy::Pinned { root } => {
                if physical.cells().into_iter().any(|&c| !self.store.is_ancestor_or_self(root, c)) {
                    return Err(Error::ConfigMismatch(format!("Placement of {} leaves its pinned cell", request.name())));
                }
                SearchScope::Pinned
            }
            _ if physical.cells().into_iter().all(|&c| self.reservations.owner_of(c) == Some(&request.virtual_cluster)) => SearchScope::Reserved,
            _ => SearchScope::Shared,
        };
        Ok(self.placement(request, physical, scope))
    }

    fn check_shape(&self, request: &PodGroupSchedulingRequest, demand: &GroupDemand, physical: &PhysicalPlacement) -> Result<()> {
        let mismatch = |what: String| Error::ConfigMismatch(format!("Placement of {} does not match its request: {}", request.name(), what));

        if demand.name != physical.name || demand.pods.len() != physical.pods.len() || demand.child_groups.len() != physical.child_groups.len() {
            return Err(mismatch(format!("group {} has a different shape", demand.name)));
        }
        for (pod, cells) in demand.pods.iter().zip(&physical.pods) {
            if cells.len() != pod.cell_number as usize {
                return Err(mismatch(format!("pod of {} needs {} cells, got {}", demand.name, pod.cell_number, cells.len())));
            }
            for &cell in cells {
                let physical_cell = self.store.cell(cell);
                if physical_cell.chain != request.chain || physical_cell.level != pod.level {
                    return Err(mismatch(format!("cell {} is not a {} cell of chain {}", physical_cell.address, pod.level, request.chain)));
                }
            }
        }
        demand.child_groups.iter().zip(&physical.child_groups).try_for_each(|(child, placed)| self.check_shape(request, child, placed))
    }

    fn run_pass(
        &self,
        request: &PodGroupSchedulingRequest,
        demand: &GroupDemand,
        universe: &[CellId],
        snapshot: OccupancySnapshot,
        allow_eviction: bool,
    ) -> Option<(PhysicalPlacement, BTreeSet<AllocationId>)> {
        let pass = SearchPass { engine: self, universe, virtual_cluster: &request.virtual_cluster, priority: request.priority, allow_eviction };
        let mut state = SearchState { snapshot, blockers: BTreeSet::new() };
        let physical = pass.place_group(&mut state, demand, None)?;
        Some((physical, state.blockers))
    }

    fn placement(&self, request: &PodGroupSchedulingRequest, physical: PhysicalPlacement, scope: SearchScope) -> Placement {
        let virtual_placement = physical.map(&|&cell| {
            if self.reservations.owner_of(cell) == Some(&request.virtual_cluster) { self.reservations.virtual_cell_of(cell) } else { None }
        });
        Placement { physical, virtual_placement, scope }
    }
}

impl SearchPass<'_, '_> {
    fn store(&self) -> &CellStore {
        self.engine.store
    }

    fn place_group(&self, state: &mut SearchState, demand: &GroupDemand, bound: Option<CellId>) -> Option<PhysicalPlacement> {
        let needs_container = match (demand.within_level, bound) {
            (Some(level), Some(outer)) => self.store().cell(outer).level > level,
            (Some(_), None) => true,
            (None, _) => false,
        };
        let Some(level) = demand.within_level.filter(|_| needs_container) else {
            return self.place_members(state, demand, bound);
        };

        let candidates: Vec<(CellId, BTreeSet<AllocationId>)> = self
            .containers(level, bound)
            .into_iter()
            .filter_map(|container| self.group_victims(state, container, demand.leaf_number).map(|victims| (container, victims)))
            .collect();

        for container in self.rank(state, candidates) {
            let mut trial = state.clone();
            if let Some(placement) = self.place_members(&mut trial, demand, Some(container)) {
                *state = trial;
                return Some(placement);
            }
        }
        None
    }

    /// Child groups first, then pods, each largest first. Results are stored in request order.
    fn place_members(&self, state: &mut SearchState, demand: &GroupDemand, bound: Option<CellId>) -> Option<PhysicalPlacement> {
        let mut child_groups: Vec<Option<PhysicalPlacement>> = vec![None; demand.child_groups.len()];
        for index in demand.child_order() {
            child_groups[index] = Some(self.place_group(state, &demand.child_groups[index], bound)?);
        }

        let mut pods: Vec<Vec<CellId>> = vec![Vec::new(); demand.pods.len()];
        for index in demand.pod_order() {
            pods[index] = self.place_pod(state, &demand.pods[index], bound)?;
        }

        Some(PodGroupPlacement { name: demand.name.clone(), pods, child_groups: child_groups.into_iter().flatten().collect() })
    }

    fn place_pod(&self, state: &mut SearchState, pod: &PodDemand, bound: Option<CellId>) -> Option<Vec<CellId>> {
        let candidates: Vec<(CellId, BTreeSet<AllocationId>)> = self
            .containers(pod.container_level, bound)
            .into_iter()
            .filter_map(|container| {
                let picks = self.pick_cells(state, container, pod)?;
                Some((container, self.victims_of(state, &picks)))
            })
            .collect();

        let container = self.rank(state, candidates).into_iter().next()?;
        let picks = self.pick_cells(state, container, pod)?;
        for &cell in &picks {
            self.claim(state, cell);
        }
        Some(picks)
    }

    /// Cells of `level` that may host the demand, inside `bound` or the pass universe.
    ///
    /// A universe root below `level` contributes its ancestor at `level`, so reserved cells that share
    /// one coarser cell can still host a demand spanning it. Only the universe part of such a
    /// container is ever picked from.
    fn containers(&self, level: CellLevel, bound: Option<CellId>) -> Vec<CellId> {
        let store = self.store();
        let cells: Vec<CellId> = match bound {
            Some(outer) => store.descendants_at_level(outer, level),
            None => self
                .universe
                .iter()
                .flat_map(|&root| {
                    if store.cell(root).level >= level { store.descendants_at_level(root, level) } else { store.ancestor_at_level(root, level).into_iter().collect() }
                })
                .collect(),
        };
        let mut seen = BTreeSet::new();
        cells.into_iter().filter(|&cell| seen.insert(cell) && !self.universe_parts(cell).is_empty()).collect()
    }

    /// The parts of `container` this pass may use: the container itself when it lies inside the
    /// universe, otherwise the universe roots below it.
    fn universe_parts(&self, container: CellId) -> Vec<CellId> {
        let store = self.store();
        if self.universe.iter().any(|&root| store.is_ancestor_or_self(root, container)) {
            return vec![container];
        }
        self.universe.iter().copied().filter(|&root| store.is_ancestor_or_self(container, root)).collect()
    }

    fn usable_free_leaves(&self, state: &SearchState, container: CellId) -> u32 {
        self.universe_parts(container).into_iter().map(|part| state.snapshot.occupancy().free_leaves(self.store(), part)).sum()
    }

    fn is_usable(&self, state: &SearchState, cell: CellId) -> bool {
        state.snapshot.occupancy().is_free(cell) || (self.allow_eviction && state.snapshot.is_reclaimable(self.store(), cell, self.priority))
    }

    /// Cells for `pod` inside `container`: free cells first, then the cheapest to reclaim, then topology order.
    fn pick_cells(&self, state: &SearchState, container: CellId, pod: &PodDemand) -> Option<Vec<CellId>> {
        let mut usable: Vec<(CellPriority, usize, CellId)> = self
            .universe_parts(container)
            .into_iter()
            .flat_map(|part| self.store().descendants_at_level(part, pod.level))
            .filter(|&cell| self.is_usable(state, cell))
            .map(|cell| (self.eviction_cost(state, cell), self.store().cell(cell).order, cell))
            .collect();
        if usable.len() < pod.cell_number as usize {
            return None;
        }
        usable.sort();
        let mut picks: Vec<(usize, CellId)> = usable.into_iter().take(pod.cell_number as usize).map(|(_, order, cell)| (order, cell)).collect();
        picks.sort();
        Some(picks.into_iter().map(|(_, cell)| cell).collect())
    }

    /// Highest priority that taking `cell` would evict, `FREE` for a free cell.
    fn eviction_cost(&self, state: &SearchState, cell: CellId) -> CellPriority {
        if state.snapshot.occupancy().is_free(cell) {
            return CellPriority::FREE;
        }
        state.snapshot.blockers_of(self.store(), cell).iter().filter_map(|&id| state.snapshot.allocation(id)).map(|a| a.priority).max().unwrap_or(CellPriority::FREE)
    }

    fn victims_of(&self, state: &SearchState, cells: &[CellId]) -> BTreeSet<AllocationId> {
        cells.iter().filter(|&&cell| !state.snapshot.occupancy().is_free(cell)).flat_map(|&cell| state.snapshot.blockers_of(self.store(), cell)).collect()
    }

    /// Victims a whole group would cost inside `container`, or `None` if it cannot fit at all.
    fn group_victims(&self, state: &SearchState, container: CellId, leaf_demand: u32) -> Option<BTreeSet<AllocationId>> {
        let occupancy = state.snapshot.occupancy();
        let free = self.usable_free_leaves(state, container);
        if free >= leaf_demand {
            return Some(BTreeSet::new());
        }
        if !self.allow_eviction {
            return None;
        }

        let mut reclaimable = BTreeSet::new();
        let mut reclaimable_leaves = 0;
        for leaf in self.universe_parts(container).into_iter().flat_map(|part| self.store().leaves(part)) {
            if let Some(Occupant::Allocation(id)) = occupancy.occupant(leaf)
                && state.snapshot.priority_of(Occupant::Allocation(id)).is_preemptible_by(self.priority)
            {
                reclaimable.insert(id);
                reclaimable_leaves += 1;
            }
        }
        (free + reclaimable_leaves >= leaf_demand).then_some(reclaimable)
    }

    /// Orders candidates by the configured policy.
    fn rank(&self, state: &SearchState, candidates: Vec<(CellId, BTreeSet<AllocationId>)>) -> Vec<CellId> {
        let store = self.store();
        let occupancy = state.snapshot.occupancy();
        let ordering = self.engine.config.ordering;

        let mut keyed: Vec<_> = candidates
            .into_iter()
            .map(|(cell, victims)| {
                let victim_priority = victims.iter().filter_map(|&id| state.snapshot.allocation(id)).map(|a| a.priority).max().unwrap_or(CellPriority::FREE);
                let victim_leaves = victims.iter().filter_map(|&id| state.snapshot.allocation(id)).map(|a| a.leaf_number).sum();
                let facts = CandidateFacts {
                    victim_priority,
                    victim_leaves,
                    foreign_reserved_leaves: self.engine.reservations.foreign_reserved_leaves(store, cell, self.virtual_cluster),
                    free_leaves: self.usable_free_leaves(state, cell),
                    parent_free_leaves: store.cell(cell).parent.map_or(0, |parent| occupancy.free_leaves(store, parent)),
                    order: store.cell(cell).order,
                };
                (ordering.key(&facts), cell)
            })
            .collect();
        keyed.sort();
        keyed.into_iter().map(|(_, cell)| cell).collect()
    }

    /// Takes `cell` in the working snapshot, evicting whole blocking allocations first.
    fn claim(&self, state: &mut SearchState, cell: CellId) {
        if !state.snapshot.occupancy().is_free(cell) {
            for blocker in state.snapshot.blockers_of(self.store(), cell) {
                state.snapshot.evict(self.store(), blocker);
                state.blockers.insert(blocker);
            }
        }
        state.snapshot.take(self.store(), cell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::allocation::allocation::AllocationSummary;
    use crate::domain::allocation::occupancy::Occupant;
    use crate::domain::placement::candidate::CandidateOrdering;
    use crate::domain::request::pod_group_spec::PodGroupSpec;
    use crate::domain::test_fixtures::{fine_grained_cluster_config, rack_cluster_config, small_cluster_config};
    use slotmap::SlotMap;

    struct Fixture {
        store: CellStore,
        reservations: ReservationMap,
        snapshot: OccupancySnapshot,
        ids: SlotMap<AllocationId, ()>,
    }

    impl Fixture {
        fn new(config: crate::api::scheduler_config_dto::ClusterConfigDto) -> Self {
            let store = CellStore::from_dto(&config.physical_cluster).unwrap();
            let reservations = ReservationMap::build(&store, &config.virtual_clusters).unwrap();
            Fixture { store, reservations, snapshot: OccupancySnapshot::empty(), ids: SlotMap::with_key() }
        }

        fn engine(&self) -> PlacementSearchEngine<'_> {
            PlacementSearchEngine::new(&self.store, &self.reservations, SearchConfig::default())
        }

        fn reserved_only_engine(&self) -> PlacementSearchEngine<'_> {
            PlacementSearchEngine::new(&self.store, &self.reservations, SearchConfig { allow_shared_fallback: false, ..SearchConfig::default() })
        }

        fn occupy(&mut self, priority: i32, addresses: &[&str]) -> AllocationId {
            let id = self.ids.insert(());
            let cells: Vec<CellId> = addresses.iter().map(|a| self.store.find_by_address(a).unwrap()).collect();
            for &cell in &cells {
                self.snapshot.occupancy.occupy(&self.store, cell, Occupant::Allocation(id));
            }
            let leaves = cells.iter().map(|&c| self.store.cell(c).leaf_number).sum();
            let mut summary = AllocationSummary::for_test(id, priority, cells);
            summary.leaf_number = leaves;
            self.snapshot.allocations.insert(id, summary);
            id
        }

        fn addresses(&self, placement: &Placement) -> Vec<String> {
            placement.physical.cells().into_iter().map(|&c| self.store.address(c).to_string()).collect()
        }
    }

    #[test]
    fn reserved_cells_are_used_first_and_carry_virtual_coordinates() {
        let fixture = Fixture::new(small_cluster_config());
        let request = PodGroupSchedulingRequest::new("a", "NODE", 5, PodGroupSpec::uniform("train", 1, "GPU", 2));

        let SearchOutcome::Placed(placement) = fixture.engine().search(&request, &fixture.snapshot).unwrap() else { panic!("expected a placement") };

        assert_eq!(placement.scope, SearchScope::Reserved);
        assert_eq!(fixture.addresses(&placement), vec!["node0/0/0", "node0/0/1"]);
        assert!(placement.virtual_placement.cells().into_iter().all(|v| v.is_some()));
    }

    #[test]
    fn groups_coarser_than_the_reserved_roots_stay_in_the_reservation() {
        let fixture = Fixture::new(fine_grained_cluster_config());
        let request = PodGroupSchedulingRequest::new("a", "RACK", 5, PodGroupSpec::uniform("gang", 2, "GPU", 2).within("NODE"));

        let SearchOutcome::Placed(placement) = fixture.reserved_only_engine().search(&request, &fixture.snapshot).unwrap() else { panic!("expected a placement") };

        assert_eq!(placement.scope, SearchScope::Reserved);
        assert_eq!(fixture.addresses(&placement), vec!["node0/0/0", "node0/0/1", "node0/1/0", "node0/1/1"]);
        assert!(placement.virtual_placement.cells().into_iter().all(|v| v.is_some()));
    }

    #[test]
    fn pods_coarser_than_the_reserved_roots_use_the_shared_parent() {
        let fixture = Fixture::new(fine_grained_cluster_config());
        let pair = PodGroupSchedulingRequest::new("c", "RACK", 5, PodGroupSpec::uniform("pair", 1, "GPU", 2));

        let SearchOutcome::Placed(placement) = fixture.reserved_only_engine().search(&pair, &fixture.snapshot).unwrap() else { panic!("expected a placement") };

        assert_eq!(placement.scope, SearchScope::Reserved);
        assert_eq!(fixture.addresses(&placement), vec!["node1/0/0", "node1/0/1"]);
        assert!(placement.virtual_placement.cells().into_iter().all(|v| v.is_some()));
    }

    #[test]
    fn picks_under_a_shared_parent_never_leave_the_reservation() {
        let fixture = Fixture::new(fine_grained_cluster_config());
        // node1 has four free GPUs but only two of them belong to "c".
        let quad = PodGroupSchedulingRequest::new("c", "RACK", 5, PodGroupSpec::uniform("quad", 1, "GPU", 4));

        assert!(matches!(fixture.reserved_only_engine().search(&quad, &fixture.snapshot).unwrap(), SearchOutcome::Infeasible(_)));
    }

    #[test]
    fn shared_placements_avoid_other_tenants_reservations() {
        let fixture = Fixture::new(small_cluster_config());
        let request = PodGroupSchedulingRequest::new("b", "NODE", 10, PodGroupSpec::uniform("filler", 1, "GPU", 2));

        let SearchOutcome::Placed(placement) = fixture.engine().search(&request, &fixture.snapshot).unwrap() else { panic!("expected a placement") };

        assert_eq!(placement.scope, SearchScope::Shared);
        assert_eq!(fixture.addresses(&placement), vec!["node0/1/0", "node0/1/1"]);
        assert!(placement.virtual_placement.cells().into_iter().all(|v| v.is_none()));
    }

    #[test]
    fn lower_priority_blockers_lead_to_preemption_required() {
        let mut fixture = Fixture::new(small_cluster_config());
        fixture.occupy(10, &["node0/1"]);
        let tenant_a = fixture.occupy(5, &["node0/0/0", "node0/0/1"]);

        let weak = PodGroupSchedulingRequest::new("b", "NODE", 3, PodGroupSpec::uniform("weak", 1, "GPU", 2));
        assert!(matches!(fixture.engine().search(&weak, &fixture.snapshot).unwrap(), SearchOutcome::Infeasible(_)));

        let strong = PodGroupSchedulingRequest::new("b", "NODE", 8, PodGroupSpec::uniform("strong", 1, "GPU", 2));
        match fixture.engine().search(&strong, &fixture.snapshot).unwrap() {
            SearchOutcome::PreemptionRequired { placement, blockers } => {
                assert_eq!(blockers, BTreeSet::from([tenant_a]));
                assert_eq!(fixture.addresses(&placement), vec!["node0/0/0", "node0/0/1"]);
            }
            other => panic!("expected preemption, got {:?}", other),
        }
    }

    #[test]
    fn cheapest_victims_are_picked_inside_a_container() {
        let mut fixture = Fixture::new(small_cluster_config());
        fixture.occupy(0, &["node0/0/0", "node0/0/1"]);
        let spare = fixture.occupy(-1, &["node0/1/0", "node0/1/1"]);
        let request = PodGroupSchedulingRequest::new("b", "NODE", 1, PodGroupSpec::uniform("urgent", 1, "GPU", 2));

        match fixture.engine().search(&request, &fixture.snapshot).unwrap() {
            SearchOutcome::PreemptionRequired { placement, blockers } => {
                assert_eq!(blockers, BTreeSet::from([spare]));
                assert_eq!(fixture.addresses(&placement), vec!["node0/1/0", "node0/1/1"]);
            }
            other => panic!("expected preemption, got {:?}", other),
        }
    }

    #[test]
    fn opportunistic_requests_never_preempt() {
        let mut fixture = Fixture::new(small_cluster_config());
        fixture.occupy(-1, &["node0"]);
        let request = PodGroupSchedulingRequest::new("b", "NODE", -1, PodGroupSpec::uniform("scavenger", 1, "GPU", 1));
        assert!(matches!(fixture.engine().search(&request, &fixture.snapshot).unwrap(), SearchOutcome::Infeasible(_)));
    }

    #[test]
    fn pinned_requests_never_spill() {
        let mut fixture = Fixture::new(rack_cluster_config());
        fixture.occupy(7, &["node1/1/0"]);
        let request = PodGroupSchedulingRequest::new("a", "RACK", 9, PodGroupSpec::uniform("pinned", 1, "GPU", 2)).pinned_to("pin-0");

        match fixture.engine().search(&request, &fixture.snapshot).unwrap() {
            SearchOutcome::PreemptionRequired { placement, .. } => {
                assert_eq!(placement.scope, SearchScope::Pinned);
                assert_eq!(fixture.addresses(&placement), vec!["node1/1/0", "node1/1/1"]);
            }
            other => panic!("expected preemption inside the pinned cell, got {:?}", other),
        }

        let low = PodGroupSchedulingRequest::new("a", "RACK", 2, PodGroupSpec::uniform("pinned-low", 1, "GPU", 2)).pinned_to("pin-0");
        assert!(matches!(fixture.engine().search(&low, &fixture.snapshot).unwrap(), SearchOutcome::Infeasible(_)));
    }

    #[test]
    fn groups_bound_to_one_cell_stay_inside_it() {
        let mut fixture = Fixture::new(rack_cluster_config());
        fixture.occupy(9, &["node0/0/0"]);
        let spec = PodGroupSpec::uniform("gang", 2, "GPU", 1).within("NODE").with_child(PodGroupSpec::uniform("ps", 1, "SWITCH", 1));
        let request = PodGroupSchedulingRequest::new("b", "RACK", 1, spec);

        let SearchOutcome::Placed(placement) = fixture.engine().search(&request, &fixture.snapshot).unwrap() else { panic!("expected a placement") };

        let node_of = |c: &CellId| fixture.store.ancestor_at_level(*c, CellLevel(3)).unwrap();
        let nodes: BTreeSet<CellId> = placement.physical.cells().into_iter().map(node_of).collect();
        assert_eq!(nodes.len(), 1);
        assert_eq!(placement.physical.child_groups[0].pods[0].len(), 1);
    }

    #[test]
    fn identical_state_gives_identical_placements() {
        let mut fixture = Fixture::new(rack_cluster_config());
        fixture.occupy(4, &["node1/0/1"]);
        let request = PodGroupSchedulingRequest::new("b", "RACK", 6, PodGroupSpec::uniform("job", 3, "GPU", 1));

        let first = fixture.engine().search(&request, &fixture.snapshot).unwrap();
        for _ in 0..5 {
            let again = fixture.engine().search(&request, &fixture.snapshot).unwrap();
            match (&first, &again) {
                (SearchOutcome::Placed(a), SearchOutcome::Placed(b)) => assert_eq!(a, b),
                other => panic!("expected two placements, got {:?}", other),
            }
        }
    }

    #[test]
    fn address_ordering_takes_the_first_free_cells() {
        let fixture = Fixture::new(small_cluster_config());
        let engine = PlacementSearchEngine::new(&fixture.store, &fixture.reservations, SearchConfig { ordering: CandidateOrdering::Address, allow_shared_fallback: true });
        let request = PodGroupSchedulingRequest::new("b", "NODE", 10, PodGroupSpec::uniform("filler", 1, "GPU", 1));

        let SearchOutcome::Placed(placement) = engine.search(&request, &fixture.snapshot).unwrap() else { panic!("expected a placement") };
        assert_eq!(fixture.addresses(&placement), vec!["node0/0/0"]);
    }

    #[test]
    fn search_never_mutates_the_snapshot() {
        let mut fixture = Fixture::new(small_cluster_config());
        fixture.occupy(1, &["node0/0"]);
        let before = fixture.snapshot.occupancy().used_leaves(fixture.store.find_by_address("node0").unwrap());

        let request = PodGroupSchedulingRequest::new("b", "NODE", 8, PodGroupSpec::uniform("job", 1, "GPU", 4));
        let _ = fixture.engine().search(&request, &fixture.snapshot).unwrap();

        assert_eq!(fixture.snapshot.occupancy().used_leaves(fixture.store.find_by_address("node0").unwrap()), before);
    }

    #[test]
    fn restored_placements_are_shape_checked() {
        let fixture = Fixture::new(small_cluster_config());
        let request = PodGroupSchedulingRequest::new("a", "NODE", 5, PodGroupSpec::uniform("train", 1, "GPU", 2));
        let engine = fixture.engine();

        let view = PodGroupPlacement { name: "train".to_string(), pods: vec![vec!["node0/0/0".into(), "node0/0/1".into()]], child_groups: Vec::new() };
        let placement = engine.placement_from_physical(&request, &view).unwrap();
        assert_eq!(placement.scope, SearchScope::Reserved);

        let wrong_level = PodGroupPlacement { name: "train".to_string(), pods: vec![vec!["node0/0".into(), "node0/1".into()]], child_groups: Vec::new() };
        assert!(matches!(engine.placement_from_physical(&request, &wrong_level), Err(Error::ConfigMismatch(_))));

        let unknown = PodGroupPlacement { name: "train".to_string(), pods: vec![vec!["node9/0/0".into(), "node0/0/1".into()]], child_groups: Vec::new() };
        assert!(matches!(engine.placement_from_physical(&request, &unknown), Err(Error::ConfigMismatch(_))));
    }
}
