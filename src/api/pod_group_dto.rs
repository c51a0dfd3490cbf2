use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CellsPerPodDto {
    pub cell_type: String,
    pub cell_number: u32,
}

#[derive(Debug, Deserialize, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PodGroupMemberSpecDto {
    pub pod_number: u32,
    pub cells_per_pod: CellsPerPodDto,
}

/// Inbound pod group tree: pods of this group plus nested child groups.
#[derive(Debug, Deserialize, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PodGroupSpecDto {
    pub name: String,
    #[serde(default)]
    pub within_one_cell: Option<String>,
    #[serde(default)]
    pub pods: Vec<PodGroupMemberSpecDto>,
    #[serde(default)]
    pub child_groups: Vec<PodGroupSpecDto>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodGroupSchedulingRequestDto {
    pub virtual_cluster: String,
    #[serde(default)]
    pub pinned_cell_id: Option<String>,
    pub chain: String,
    pub priority: i32,
    pub pod_root_group: PodGroupSpecDto,
}
