use serde::Serialize;

use crate::api::pod_group_dto::{PodGroupMemberSpecDto, PodGroupSpecDto};
use crate::domain::utils::id::CellTypeName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellsPerPod {
    pub cell_type: CellTypeName,
    pub cell_number: u32,
}

/// `pod_number` identical pods, each needing `cells_per_pod`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodGroupMemberSpec {
    pub pod_number: u32,
    pub cells_per_pod: CellsPerPod,
}

/// The internal dependency tree of a gang: its own pods plus nested child groups.
/// `within_one_cell` forces everything below this node into a single cell of that type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodGroupSpec {
    pub name: String,
    pub within_one_cell: Option<CellTypeName>,
    pub pods: Vec<PodGroupMemberSpec>,
    pub child_groups: Vec<PodGroupSpec>,
}

impl PodGroupSpec {
    pub fn from_dto(dto: &PodGroupSpecDto) -> PodGroupSpec {
        PodGroupSpec {
            name: dto.name.clone(),
            within_one_cell: dto.within_one_cell.clone().map(CellTypeName::new),
            pods: dto.pods.iter().map(PodGroupMemberSpec::from_dto).collect(),
            child_groups: dto.child_groups.iter().map(PodGroupSpec::from_dto).collect(),
        }
    }

    /// A group of `pod_number` pods of `cell_number` cells of `cell_type` each.
    pub fn uniform(name: impl Into<String>, pod_number: u32, cell_type: &str, cell_number: u32) -> PodGroupSpec {
        PodGroupSpec {
            name: name.into(),
            within_one_cell: None,
            pods: vec![PodGroupMemberSpec { pod_number, cells_per_pod: CellsPerPod { cell_type: CellTypeName::new(cell_type), cell_number } }],
            child_groups: Vec::new(),
        }
    }

    pub fn within(mut self, cell_type: &str) -> PodGroupSpec {
        self.within_one_cell = Some(CellTypeName::new(cell_type));
        self
    }

    pub fn with_child(mut self, child: PodGroupSpec) -> PodGroupSpec {
        self.child_groups.push(child);
        self
    }

    /// Pods of this node of the tree, one entry per pod.
    pub fn flattened_pods(&self) -> impl Iterator<Item = &CellsPerPod> {
        self.pods.iter().flat_map(|member| std::iter::repeat_n(&member.cells_per_pod, member.pod_number as usize))
    }

    pub fn total_pod_number(&self) -> u32 {
        self.pods.iter().map(|m| m.pod_number).sum::<u32>() + self.child_groups.iter().map(|c| c.total_pod_number()).sum::<u32>()
    }
}

impl PodGroupMemberSpec {
    fn from_dto(dto: &PodGroupMemberSpecDto) -> PodGroupMemberSpec {
        PodGroupMemberSpec {
            pod_number: dto.pod_number,
            cells_per_pod: CellsPerPod { cell_type: CellTypeName::new(dto.cells_per_pod.cell_type.clone()), cell_number: dto.cells_per_pod.cell_number },
        }
    }
}
