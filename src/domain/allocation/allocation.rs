use slotmap::new_key_type;

use crate::domain::allocation::allocated_pod_group::AllocatedPodGroup;
use crate::domain::placement::search_engine::Placement;
use crate::domain::request::priority::CellPriority;
use crate::domain::topology::cell::CellId;
use crate::domain::utils::id::{ChainName, PodGroupName, VirtualClusterName};

new_key_type! {
    pub struct AllocationId;
}

/// A committed pod group: where it sits and which of its pods are bound.
#[derive(Debug, Clone)]
pub struct Allocation {
    pub group: PodGroupName,
    pub virtual_cluster: VirtualClusterName,
    pub chain: ChainName,
    pub priority: CellPriority,
    pub placement: Placement,
    pub pod_group: AllocatedPodGroup,
    pub leaf_number: u32,
}

impl Allocation {
    pub fn cells(&self) -> Vec<CellId> {
        self.placement.cells()
    }

    pub fn summary(&self, id: AllocationId) -> AllocationSummary {
        AllocationSummary {
            id,
            group: self.group.clone(),
            virtual_cluster: self.virtual_cluster.clone(),
            priority: self.priority,
            cells: self.cells(),
            leaf_number: self.leaf_number,
        }
    }
}

/// The part of an allocation a search needs to reason about evicting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationSummary {
    pub id: AllocationId,
    pub group: PodGroupName,
    pub virtual_cluster: VirtualClusterName,
    pub priority: CellPriority,
    /// The cells the allocation was committed on, not their descendants.
    pub cells: Vec<CellId>,
    pub leaf_number: u32,
}

#[cfg(test)]
impl AllocationSummary {
    pub(crate) fn for_test(id: AllocationId, priority: i32, cells: Vec<CellId>) -> Self {
        AllocationSummary {
            id,
            group: PodGroupName::new(format!("group-{:?}", id)),
            virtual_cluster: VirtualClusterName::new("test"),
            priority: CellPriority(priority),
            leaf_number: cells.len() as u32,
            cells,
        }
    }
}
