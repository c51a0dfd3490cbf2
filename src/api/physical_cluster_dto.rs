use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Describes one level of a chain: which cell type sits below it and how many of them.
/// A cell type without `child_cell_type` is a leaf (e.g. a single device).
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellTypeSpecDto {
    #[serde(default)]
    pub child_cell_type: Option<String>,
    #[serde(default)]
    pub child_cell_number: u32,
    #[serde(default)]
    pub is_node_level: bool,
}

/// A concrete cell instance. Top-level entries name their chain through `cell_type`;
/// children may omit everything and are then generated as `<parent>/<index>`.
#[derive(Debug, Deserialize, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalCellSpecDto {
    #[serde(default)]
    pub cell_type: Option<String>,
    #[serde(default)]
    pub cell_address: Option<String>,
    #[serde(default)]
    pub pinned_cell_id: Option<String>,
    #[serde(default)]
    pub cell_children: Vec<PhysicalCellSpecDto>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalClusterDto {
    pub cell_types: BTreeMap<String, CellTypeSpecDto>,
    pub physical_cells: Vec<PhysicalCellSpecDto>,
}
