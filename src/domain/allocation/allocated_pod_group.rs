use serde::Serialize;

use crate::domain::placement::placement_tree::{PodGroupPlacement, PodSlot};
use crate::domain::utils::id::{CellAddress, PodUid};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundPod {
    pub uid: PodUid,
    pub leaf_cells: Vec<CellAddress>,
}

/// Mirror of the request's group tree holding the pods bound so far. One slot per pod of the
/// placement; a slot stays `None` until the binding layer reports that pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocatedPodGroup {
    pub name: String,
    pub pods: Vec<Option<BoundPod>>,
    pub child_groups: Vec<AllocatedPodGroup>,
}

impl AllocatedPodGroup {
    /// Empty tree with the shape of `placement`.
    pub fn from_placement<C>(placement: &PodGroupPlacement<C>) -> Self {
        AllocatedPodGroup {
            name: placement.name.clone(),
            pods: vec![None; placement.pods.len()],
            child_groups: placement.child_groups.iter().map(AllocatedPodGroup::from_placement).collect(),
        }
    }

    fn node_mut(&mut self, group_path: &[usize]) -> Option<&mut AllocatedPodGroup> {
        match group_path.split_first() {
            None => Some(self),
            Some((&head, rest)) => self.child_groups.get_mut(head)?.node_mut(rest),
        }
    }

    fn node(&self, group_path: &[usize]) -> Option<&AllocatedPodGroup> {
        match group_path.split_first() {
            None => Some(self),
            Some((&head, rest)) => self.child_groups.get(head)?.node(rest),
        }
    }

    pub fn pod_at(&self, slot: &PodSlot) -> Option<&BoundPod> {
        self.node(&slot.group_path)?.pods.get(slot.pod_index)?.as_ref()
    }

    /// Attaches `pod` to an empty `slot`.
    pub fn bind(&mut self, slot: &PodSlot, pod: BoundPod) -> Result<()> {
        let group_name = self.name.clone();
        let entry = self
            .node_mut(&slot.group_path)
            .and_then(|node| node.pods.get_mut(slot.pod_index))
            .ok_or_else(|| Error::PodBindingMismatch(format!("Pod group {} has no pod slot {:?}", group_name, slot)))?;

        if let Some(existing) = entry.as_ref() {
            return Err(Error::PodBindingMismatch(format!("Slot {:?} of {} is already bound to pod {}", slot, group_name, existing.uid)));
        }
        *entry = Some(pod);
        Ok(())
    }

    pub fn find_pod(&self, uid: &PodUid) -> Option<PodSlot> {
        self.bound_pods().into_iter().find(|(_, pod)| &pod.uid == uid).map(|(slot, _)| slot)
    }

    pub fn bound_pods(&self) -> Vec<(PodSlot, &BoundPod)> {
        let mut result = Vec::new();
        self.collect_bound(&mut Vec::new(), &mut result);
        result
    }

    fn collect_bound<'a>(&'a self, path: &mut Vec<usize>, out: &mut Vec<(PodSlot, &'a BoundPod)>) {
        for (pod_index, pod) in self.pods.iter().enumerate() {
            if let Some(pod) = pod {
                out.push((PodSlot { group_path: path.clone(), pod_index }, pod));
            }
        }
        for (index, child) in self.child_groups.iter().enumerate() {
            path.push(index);
            child.collect_bound(path, out);
            path.pop();
        }
    }

    pub fn is_fully_bound(&self) -> bool {
        self.pods.iter().all(Option::is_some) && self.child_groups.iter().all(AllocatedPodGroup::is_fully_bound)
    }
}
