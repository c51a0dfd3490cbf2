use serde::Serialize;

use crate::api::pod_group_dto::PodGroupSchedulingRequestDto;
use crate::domain::request::{pod_group_spec::PodGroupSpec, priority::CellPriority};
use crate::domain::utils::id::{ChainName, PinnedCellId, PodGroupName, VirtualClusterName};

/// What the intake layer asks for: place `pod_root_group` on `chain` for `virtual_cluster`.
/// The group is identified by the name of its root group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodGroupSchedulingRequest {
    pub virtual_cluster: VirtualClusterName,
    pub pinned_cell_id: Option<PinnedCellId>,
    pub pod_root_group: PodGroupSpec,
    pub chain: ChainName,
    pub priority: CellPriority,
}

impl PodGroupSchedulingRequest {
    pub fn new(virtual_cluster: &str, chain: &str, priority: i32, pod_root_group: PodGroupSpec) -> Self {
        PodGroupSchedulingRequest {
            virtual_cluster: VirtualClusterName::new(virtual_cluster),
            pinned_cell_id: None,
            pod_root_group,
            chain: ChainName::new(chain),
            priority: CellPriority(priority),
        }
    }

    pub fn from_dto(dto: &PodGroupSchedulingRequestDto) -> Self {
        PodGroupSchedulingRequest {
            virtual_cluster: VirtualClusterName::new(dto.virtual_cluster.clone()),
            pinned_cell_id: dto.pinned_cell_id.clone().map(PinnedCellId::new),
            pod_root_group: PodGroupSpec::from_dto(&dto.pod_root_group),
            chain: ChainName::new(dto.chain.clone()),
            priority: CellPriority(dto.priority),
        }
    }

    pub fn pinned_to(mut self, pinned_cell_id: &str) -> Self {
        self.pinned_cell_id = Some(PinnedCellId::new(pinned_cell_id));
        self
    }

    pub fn name(&self) -> PodGroupName {
        PodGroupName::new(self.pod_root_group.name.clone())
    }
}
