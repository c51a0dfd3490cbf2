use slotmap::SlotMap;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::allocation::allocated_pod_group::{AllocatedPodGroup, BoundPod};
use crate::domain::allocation::allocation::{Allocation, AllocationId};
use crate::domain::allocation::occupancy::{CellOccupancy, Occupant, OccupancySnapshot};
use crate::domain::placement::placement_tree::PodSlot;
use crate::domain::placement::search_engine::Placement;
use crate::domain::request::priority::CellPriority;
use crate::domain::request::scheduling_request::PodGroupSchedulingRequest;
use crate::domain::topology::{cell::CellId, cell_store::CellStore};
use crate::domain::utils::id::{CellAddress, PodGroupName, PodUid};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct TrackerInner {
    allocations: SlotMap<AllocationId, Allocation>,

    /// Index lookup AllocationId by pod group name.
    by_group: HashMap<PodGroupName, AllocationId>,

    /// Authoritative cell -> allocation mapping.
    occupancy: CellOccupancy,
}

/// The single owner of cell occupancy.
///
/// All three tables live behind one lock. Commits and releases take the write lock, snapshots the
/// read lock, so searches can run concurrently with each other but never observe a half-applied
/// commit.
#[derive(Debug, Clone)]
pub struct AllocationTracker {
    store: Arc<CellStore>,
    inner: Arc<RwLock<TrackerInner>>,
}

impl AllocationTracker {
    pub fn new(store: Arc<CellStore>) -> Self {
        AllocationTracker { store, inner: Arc::new(RwLock::new(TrackerInner::default())) }
    }

    fn read(&self) -> RwLockReadGuard<'_, TrackerInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TrackerInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commits `placement` for `request`.
    ///
    /// The new occupancy is staged on a copy and only swapped in once every cell has been claimed,
    /// so a conflict leaves the tracker exactly as it was.
    ///
    /// # Returns
    /// The new AllocationId, `CommitConflict` if any cell is no longer free, or `AlreadyAllocated`
    /// if the group already holds cells.
    pub fn commit(&self, request: &PodGroupSchedulingRequest, placement: Placement) -> Result<AllocationId> {
        let group = request.name();
        let mut guard = self.write();

        if guard.by_group.contains_key(&group) {
            return Err(Error::AlreadyAllocated(group.to_string()));
        }

        // Prepare.
        let id = guard.allocations.insert(Allocation {
            group: group.clone(),
            virtual_cluster: request.virtual_cluster.clone(),
            chain: request.chain.clone(),
            priority: request.priority,
            pod_group: AllocatedPodGroup::from_placement(&placement.physical),
            leaf_number: placement.leaf_number(&self.store),
            placement,
        });
        let mut staged = guard.occupancy.clone();
        for cell in guard.allocations[id].cells() {
            if !staged.is_free(cell) {
                guard.allocations.remove(id);
                return Err(Error::CommitConflict { cell: self.store.address(cell).to_string() });
            }
            staged.occupy(&self.store, cell, Occupant::Allocation(id));
        }

        // Flip.
        guard.occupancy = staged;
        guard.by_group.insert(group.clone(), id);

        log::debug!("Committed {} on {} cell(s).", group, guard.allocations[id].cells().len());
        Ok(id)
    }

    /// Removes the allocation and frees exactly the cells it held.
    pub fn release(&self, id: AllocationId) -> Result<Allocation> {
        let mut guard = self.write();
        let allocation = guard.allocations.remove(id).ok_or_else(|| Error::UnknownPodGroup(format!("{:?}", id)))?;

        for cell in allocation.cells() {
            guard.occupancy.vacate(&self.store, cell);
        }
        guard.by_group.remove(&allocation.group);

        log::debug!("Released {} from {} cell(s).", allocation.group, allocation.cells().len());
        Ok(allocation)
    }

    /// Attaches pod `uid` to the pod slot of `group` whose cells cover exactly `leaf_cells`.
    ///
    /// Binding the same pod to the same cells twice is accepted.
    pub fn bind_pod(&self, group: &PodGroupName, uid: &PodUid, leaf_cells: &[CellAddress]) -> Result<PodSlot> {
        let mut leaves = BTreeSet::new();
        for address in leaf_cells {
            let cell = self
                .store
                .find_by_address(address.as_str())
                .ok_or_else(|| Error::PodBindingMismatch(format!("Unknown cell {} for pod {}", address, uid)))?;
            if !self.store.cell(cell).is_leaf() {
                return Err(Error::PodBindingMismatch(format!("Cell {} bound to pod {} is not a leaf cell", address, uid)));
            }
            leaves.insert(cell);
        }

        let mut guard = self.write();
        let id = *guard.by_group.get(group).ok_or_else(|| Error::UnknownPodGroup(group.to_string()))?;
        let allocation = &mut guard.allocations[id];

        if let Some(slot) = allocation.pod_group.find_pod(uid) {
            let requested: BTreeSet<&CellAddress> = leaf_cells.iter().collect();
            let same_cells = allocation.pod_group.pod_at(&slot).is_some_and(|pod| pod.leaf_cells.iter().collect::<BTreeSet<_>>() == requested);
            if same_cells {
                return Ok(slot);
            }
            return Err(Error::PodBindingMismatch(format!("Pod {} is already bound in {} on other cells", uid, group)));
        }

        let store = &self.store;
        let pod_group = &allocation.pod_group;
        let slot = allocation
            .placement
            .physical
            .pod_slots()
            .into_iter()
            .find(|(slot, cells)| {
                pod_group.pod_at(slot).is_none() && cells.iter().flat_map(|&c| store.leaves(c)).collect::<BTreeSet<CellId>>() == leaves
            })
            .map(|(slot, _)| slot)
            .ok_or_else(|| Error::PodBindingMismatch(format!("No free pod slot of {} covers the cells of pod {}", group, uid)))?;

        allocation.pod_group.bind(&slot, BoundPod { uid: uid.clone(), leaf_cells: leaf_cells.to_vec() })?;
        log::debug!("Bound pod {} of {} to slot {:?}.", uid, group, slot);
        Ok(slot)
    }

    /// A consistent copy of occupancy and allocation summaries for searching.
    pub fn snapshot(&self) -> OccupancySnapshot {
        let guard = self.read();
        OccupancySnapshot {
            occupancy: guard.occupancy.clone(),
            allocations: guard.allocations.iter().map(|(id, allocation)| (id, allocation.summary(id))).collect(),
        }
    }

    pub fn allocation(&self, id: AllocationId) -> Option<Allocation> {
        self.read().allocations.get(id).cloned()
    }

    pub fn allocation_of(&self, group: &PodGroupName) -> Option<AllocationId> {
        self.read().by_group.get(group).copied()
    }

    pub fn pod_group(&self, group: &PodGroupName) -> Option<AllocatedPodGroup> {
        let guard = self.read();
        let id = guard.by_group.get(group)?;
        guard.allocations.get(*id).map(|allocation| allocation.pod_group.clone())
    }

    /// Group and priority of the allocation holding `cell`, if any.
    pub fn occupant_of(&self, cell: CellId) -> Option<(PodGroupName, CellPriority)> {
        let guard = self.read();
        match guard.occupancy.occupant(cell)? {
            Occupant::Allocation(id) => guard.allocations.get(id).map(|a| (a.group.clone(), a.priority)),
            Occupant::Speculative => None,
        }
    }

    pub fn len(&self) -> usize {
        self.read().allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
