use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum CellStateDto {
    Free,
    /// Some, but not all, leaves below the cell are occupied.
    Partial,
    Used,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalCellStatusDto {
    pub cell_address: String,
    pub cell_type: String,
    pub level: u8,
    pub state: CellStateDto,
    pub used_leaf_cells: u32,
    pub total_leaf_cells: u32,
    pub occupant_group: Option<String>,
    pub occupant_priority: Option<i32>,
    pub reserved_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatusDto {
    pub chain: String,
    pub cells: Vec<PhysicalCellStatusDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatusDto {
    pub chains: Vec<ChainStatusDto>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualCellStatusDto {
    pub virtual_address: String,
    pub physical_address: String,
    pub cell_type: String,
    pub level: u8,
    pub pinned_cell_id: Option<String>,
    pub state: CellStateDto,
    pub occupant_group: Option<String>,
    pub occupant_priority: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualClusterStatusDto {
    pub name: String,
    pub cells: Vec<VirtualCellStatusDto>,
}
