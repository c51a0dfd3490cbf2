use slotmap::SecondaryMap;
use std::collections::{BTreeSet, HashMap};

use crate::domain::allocation::allocation::{AllocationId, AllocationSummary};
use crate::domain::request::priority::CellPriority;
use crate::domain::topology::{cell::CellId, cell_store::CellStore};

/// Who holds a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Occupant {
    Allocation(AllocationId),
    /// Picked by an in-flight search; only ever exists inside a snapshot.
    Speculative,
}

/// Cell -> occupant mapping.
///
/// Allocating a cell marks its whole subtree with the occupant and adds its leaves to the
/// used-leaf counters of all ancestors. A cell is free exactly when no leaf below it is used, which
/// also covers the case of an occupied ancestor.
#[derive(Debug, Clone, Default)]
pub struct CellOccupancy {
    occupants: SecondaryMap<CellId, Occupant>,
    used_leaves: SecondaryMap<CellId, u32>,
}

impl CellOccupancy {
    pub fn is_free(&self, cell: CellId) -> bool {
        self.used_leaves(cell) == 0
    }

    pub fn used_leaves(&self, cell: CellId) -> u32 {
        self.used_leaves.get(cell).copied().unwrap_or(0)
    }

    pub fn free_leaves(&self, store: &CellStore, cell: CellId) -> u32 {
        store.cell(cell).leaf_number.saturating_sub(self.used_leaves(cell))
    }

    pub fn occupant(&self, cell: CellId) -> Option<Occupant> {
        self.occupants.get(cell).copied()
    }

    /// Distinct occupants anywhere inside the subtree of `cell`.
    pub fn occupants_within(&self, store: &CellStore, cell: CellId) -> BTreeSet<Occupant> {
        if self.is_free(cell) {
            return BTreeSet::new();
        }
        store.subtree(cell).into_iter().filter_map(|c| self.occupant(c)).collect()
    }

    /// Callers must check `is_free` first.
    pub(crate) fn occupy(&mut self, store: &CellStore, cell: CellId, occupant: Occupant) {
        for c in store.subtree(cell) {
            self.occupants.insert(c, occupant);
            self.used_leaves.insert(c, store.cell(c).leaf_number);
        }
        let leaves = store.cell(cell).leaf_number;
        for ancestor in store.ancestors(cell) {
            let used = self.used_leaves(ancestor) + leaves;
            self.used_leaves.insert(ancestor, used);
        }
    }

    pub(crate) fn vacate(&mut self, store: &CellStore, cell: CellId) {
        for c in store.subtree(cell) {
            self.occupants.remove(c);
            self.used_leaves.remove(c);
        }
        let leaves = store.cell(cell).leaf_number;
        for ancestor in store.ancestors(cell) {
            let used = self.used_leaves(ancestor).saturating_sub(leaves);
            if used == 0 {
                self.used_leaves.remove(ancestor);
            } else {
                self.used_leaves.insert(ancestor, used);
            }
        }
    }
}

/// A consistent copy of the tracker's state that a search may scribble on.
#[derive(Debug, Clone)]
pub struct OccupancySnapshot {
    pub(crate) occupancy: CellOccupancy,
    pub(crate) allocations: HashMap<AllocationId, AllocationSummary>,
}

impl OccupancySnapshot {
    pub fn empty() -> Self {
        OccupancySnapshot { occupancy: CellOccupancy::default(), allocations: HashMap::new() }
    }

    pub fn occupancy(&self) -> &CellOccupancy {
        &self.occupancy
    }

    pub fn allocation(&self, id: AllocationId) -> Option<&AllocationSummary> {
        self.allocations.get(&id)
    }

    pub fn priority_of(&self, occupant: Occupant) -> CellPriority {
        match occupant {
            Occupant::Allocation(id) => self.allocations.get(&id).map_or(CellPriority::FREE, |a| a.priority),
            Occupant::Speculative => CellPriority::MAX_GUARANTEED,
        }
    }

    /// Whether every occupant below `cell` could be evicted for `priority`.
    pub fn is_reclaimable(&self, store: &CellStore, cell: CellId, priority: CellPriority) -> bool {
        self.occupancy.occupants_within(store, cell).into_iter().all(|occupant| match occupant {
            Occupant::Allocation(_) => self.priority_of(occupant).is_preemptible_by(priority),
            Occupant::Speculative => false,
        })
    }

    /// Allocations that would have to go to free `cell`.
    pub fn blockers_of(&self, store: &CellStore, cell: CellId) -> BTreeSet<AllocationId> {
        self.occupancy
            .occupants_within(store, cell)
            .into_iter()
            .filter_map(|occupant| match occupant {
                Occupant::Allocation(id) => Some(id),
                Occupant::Speculative => None,
            })
            .collect()
    }

    /// Removes a whole allocation from the snapshot. Allocations are never partially evicted.
    pub(crate) fn evict(&mut self, store: &CellStore, id: AllocationId) {
        if let Some(summary) = self.allocations.remove(&id) {
            for cell in summary.cells {
                self.occupancy.vacate(store, cell);
            }
        }
    }

    pub(crate) fn take(&mut self, store: &CellStore, cell: CellId) {
        self.occupancy.occupy(store, cell, Occupant::Speculative);
    }
}
