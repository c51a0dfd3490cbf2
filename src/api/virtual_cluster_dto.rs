use serde::{Deserialize, Serialize};

/// Quota of a virtual cluster: `cell_number` cells of `cell_type`.
/// The type is either `"<chain>.<type>"` or a bare type name that is unique across chains.
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualCellDto {
    pub cell_type: String,
    pub cell_number: u32,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedCellDto {
    pub pinned_cell_id: String,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualClusterDto {
    pub name: String,
    #[serde(default)]
    pub virtual_cells: Vec<VirtualCellDto>,
    #[serde(default)]
    pub pinned_cells: Vec<PinnedCellDto>,
}
