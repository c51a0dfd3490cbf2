use crate::domain::request::pod_group_spec::PodGroupSpec;
use crate::domain::topology::cell_chain::{CellChain, CellLevel};
use crate::error::{Error, Result};

/// One pod's resource demand, resolved against a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodDemand {
    pub level: CellLevel,
    pub cell_number: u32,
    /// Smallest level whose cells can hold all of this pod's cells. Never above the node level.
    pub container_level: CellLevel,
    pub leaf_number: u32,
}

/// A pod group spec with cell types turned into levels and locality bounds checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDemand {
    pub name: String,
    pub within_level: Option<CellLevel>,
    pub pods: Vec<PodDemand>,
    pub child_groups: Vec<GroupDemand>,
    /// Leaves needed by this node and everything below it.
    pub leaf_number: u32,
}

impl GroupDemand {
    /// Resolves `spec` on `chain`.
    ///
    /// # Returns
    /// `ConfigMismatch` if a cell type is unknown on the chain, a count is zero, a pod does not fit
    /// into one node-level cell, or a nested locality bound is coarser than its parent's.
    pub fn resolve(spec: &PodGroupSpec, chain: &CellChain) -> Result<GroupDemand> {
        Self::resolve_within(spec, chain, None)
    }

    fn resolve_within(spec: &PodGroupSpec, chain: &CellChain, bound: Option<CellLevel>) -> Result<GroupDemand> {
        if spec.pods.is_empty() && spec.child_groups.is_empty() {
            return Err(Error::ConfigMismatch(format!("Pod group '{}' has neither pods nor child groups", spec.name)));
        }

        let within_level = match &spec.within_one_cell {
            Some(cell_type) => {
                let level = chain.level_of_type(cell_type.as_str()).ok_or_else(|| {
                    Error::ConfigMismatch(format!("Pod group '{}' asks for cell type '{}' unknown on chain {}", spec.name, cell_type, chain.name))
                })?;
                if let Some(outer) = bound
                    && level > outer
                {
                    return Err(Error::ConfigMismatch(format!(
                        "Pod group '{}' must fit within one {} but its parent is bound to level {}",
                        spec.name, cell_type, outer
                    )));
                }
                Some(level)
            }
            None => None,
        };
        let effective_bound = within_level.or(bound);

        let mut pods = Vec::new();
        for member in &spec.pods {
            if member.pod_number == 0 {
                return Err(Error::ConfigMismatch(format!("Pod group '{}' has a member with zero pods", spec.name)));
            }
            let pod = Self::resolve_pod(&spec.name, member.cells_per_pod.cell_type.as_str(), member.cells_per_pod.cell_number, chain, effective_bound)?;
            pods.extend(std::iter::repeat_n(pod, member.pod_number as usize));
        }

        let child_groups = spec.child_groups.iter().map(|child| Self::resolve_within(child, chain, effective_bound)).collect::<Result<Vec<_>>>()?;

        let leaf_number = pods.iter().map(|p| p.leaf_number).sum::<u32>() + child_groups.iter().map(|c| c.leaf_number).sum::<u32>();

        if let Some(level) = within_level
            && leaf_number > chain.leaf_number(level)
        {
            return Err(Error::ConfigMismatch(format!(
                "Pod group '{}' needs {} leaf cells which exceeds one cell of level {} ({})",
                spec.name,
                leaf_number,
                level,
                chain.leaf_number(level)
            )));
        }

        Ok(GroupDemand { name: spec.name.clone(), within_level, pods, child_groups, leaf_number })
    }

    fn resolve_pod(group: &str, cell_type: &str, cell_number: u32, chain: &CellChain, bound: Option<CellLevel>) -> Result<PodDemand> {
        if cell_number == 0 {
            return Err(Error::ConfigMismatch(format!("Pod group '{}' has a pod asking for zero cells", group)));
        }
        let level = chain
            .level_of_type(cell_type)
            .ok_or_else(|| Error::ConfigMismatch(format!("Pod group '{}' asks for cell type '{}' unknown on chain {}", group, cell_type, chain.name)))?;

        let container_level = chain
            .smallest_level_holding(level, cell_number)
            .filter(|container| *container <= chain.node_level())
            .ok_or_else(|| Error::ConfigMismatch(format!("Pod of group '{}' asks for {} x {} which does not fit into one node", group, cell_number, cell_type)))?;

        if let Some(outer) = bound
            && container_level > outer
        {
            return Err(Error::ConfigMismatch(format!("Pod of group '{}' needs a level {} cell but the group is bound to level {}", group, container_level, outer)));
        }

        Ok(PodDemand { level, cell_number, container_level, leaf_number: chain.leaf_number(level) * cell_number })
    }

    /// Child group indices, largest demand first. Ties keep request order.
    pub fn child_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.child_groups.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(self.child_groups[i].leaf_number));
        order
    }

    /// Pod indices, largest demand first. Ties keep request order.
    pub fn pod_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.pods.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(self.pods[i].leaf_number));
        order
    }
}
