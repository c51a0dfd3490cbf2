use slotmap::new_key_type;

use crate::domain::topology::cell_chain::CellLevel;
use crate::domain::utils::id::{CellAddress, CellTypeName, ChainName, PinnedCellId};

new_key_type! {
    pub struct CellId;
}

/// A node of the physical topology tree.
///
/// Cells are static after construction. Which allocation currently occupies a cell is not stored
/// here but in the occupancy map of the allocation tracker, keyed by `CellId`.
#[derive(Debug, Clone)]
pub struct PhysicalCell {
    pub address: CellAddress,
    pub chain: ChainName,
    pub cell_type: CellTypeName,
    pub level: CellLevel,
    pub parent: Option<CellId>,
    pub children: Vec<CellId>,
    pub leaf_number: u32,
    pub pinned_cell_id: Option<PinnedCellId>,
    /// Pre-order position within the whole cluster. Used as the stable final tie-break.
    pub order: usize,
}

impl PhysicalCell {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}
