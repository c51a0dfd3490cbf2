use serde::{Deserialize, Serialize};

use crate::domain::reservation::virtual_cell::VirtualCellId;
use crate::domain::topology::cell::CellId;
use crate::domain::utils::id::{CellAddress, VirtualCellAddress};

/// Cells assigned to a pod group, shaped exactly like the request's group tree.
///
/// `pods[i]` holds the cells of the i-th pod of this node in request order (members are flattened,
/// so a member with `pod_number = 3` contributes three consecutive entries). `child_groups[j]`
/// mirrors the j-th child group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodGroupPlacement<C> {
    pub name: String,
    pub pods: Vec<Vec<C>>,
    #[serde(default)]
    pub child_groups: Vec<PodGroupPlacement<C>>,
}

pub type PhysicalPlacement = PodGroupPlacement<CellId>;
pub type VirtualPlacement = PodGroupPlacement<Option<VirtualCellId>>;

/// Address-keyed views handed to callers outside the crate.
pub type PhysicalPlacementView = PodGroupPlacement<CellAddress>;
pub type VirtualPlacementView = PodGroupPlacement<Option<VirtualCellAddress>>;

/// Position of one pod inside a placement tree: the child indices walked from the root, then the
/// pod index within that node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PodSlot {
    pub group_path: Vec<usize>,
    pub pod_index: usize,
}

impl<C> PodGroupPlacement<C> {
    pub fn new(name: impl Into<String>) -> Self {
        PodGroupPlacement { name: name.into(), pods: Vec::new(), child_groups: Vec::new() }
    }

    /// Same shape, every cell passed through `f`.
    pub fn map<D>(&self, f: &impl Fn(&C) -> D) -> PodGroupPlacement<D> {
        PodGroupPlacement {
            name: self.name.clone(),
            pods: self.pods.iter().map(|cells| cells.iter().map(f).collect()).collect(),
            child_groups: self.child_groups.iter().map(|child| child.map(f)).collect(),
        }
    }

    pub fn try_map<D, E>(&self, f: &impl Fn(&C) -> Result<D, E>) -> Result<PodGroupPlacement<D>, E> {
        let pods = self.pods.iter().map(|cells| cells.iter().map(f).collect::<Result<Vec<D>, E>>()).collect::<Result<Vec<_>, E>>()?;
        let child_groups = self.child_groups.iter().map(|child| child.try_map(f)).collect::<Result<Vec<_>, E>>()?;
        Ok(PodGroupPlacement { name: self.name.clone(), pods, child_groups })
    }

    /// Every cell of the tree, parents before children.
    pub fn cells(&self) -> Vec<&C> {
        let mut result: Vec<&C> = self.pods.iter().flatten().collect();
        for child in &self.child_groups {
            result.extend(child.cells());
        }
        result
    }

    pub fn pod_count(&self) -> usize {
        self.pods.len() + self.child_groups.iter().map(|c| c.pod_count()).sum::<usize>()
    }

    /// All pod slots, in the same order as `cells` visits them.
    pub fn pod_slots(&self) -> Vec<(PodSlot, &Vec<C>)> {
        let mut result = Vec::new();
        self.collect_slots(&mut Vec::new(), &mut result);
        result
    }

    fn collect_slots<'a>(&'a self, path: &mut Vec<usize>, out: &mut Vec<(PodSlot, &'a Vec<C>)>) {
        for (pod_index, cells) in self.pods.iter().enumerate() {
            out.push((PodSlot { group_path: path.clone(), pod_index }, cells));
        }
        for (index, child) in self.child_groups.iter().enumerate() {
            path.push(index);
            child.collect_slots(path, out);
            path.pop();
        }
    }

    /// First slot whose cells satisfy `matches`.
    pub fn find_pod_slot(&self, matches: impl Fn(&[C]) -> bool) -> Option<PodSlot> {
        self.pod_slots().into_iter().find(|(_, cells)| matches(cells)).map(|(slot, _)| slot)
    }

    pub fn node(&self, group_path: &[usize]) -> Option<&PodGroupPlacement<C>> {
        match group_path.split_first() {
            None => Some(self),
            Some((&head, rest)) => self.child_groups.get(head)?.node(rest),
        }
    }

    /// Whether `other` has the same tree shape and pod counts.
    pub fn same_shape<D>(&self, other: &PodGroupPlacement<D>) -> bool {
        self.name == other.name
            && self.pods.len() == other.pods.len()
            && self.pods.iter().zip(&other.pods).all(|(a, b)| a.len() == b.len())
            && self.child_groups.len() == other.child_groups.len()
            && self.child_groups.iter().zip(&other.child_groups).all(|(a, b)| a.same_shape(b))
    }
}
