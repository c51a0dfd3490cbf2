use slotmap::new_key_type;

use crate::domain::topology::{cell::CellId, cell_chain::CellLevel};
use crate::domain::utils::id::{ChainName, PinnedCellId, VirtualCellAddress, VirtualClusterName};

new_key_type! {
    pub struct VirtualCellId;
}

/// A cell expressed in tenant coordinates.
///
/// Every virtual cell is bound to exactly one physical cell; the virtual subtree mirrors the
/// physical subtree below the reserved root.
#[derive(Debug, Clone)]
pub struct VirtualCell {
    pub address: VirtualCellAddress,
    pub virtual_cluster: VirtualClusterName,
    pub chain: ChainName,
    pub level: CellLevel,
    pub physical: CellId,
    pub parent: Option<VirtualCellId>,
    pub children: Vec<VirtualCellId>,
    /// Set on the root of a pinned reservation.
    pub pinned_cell_id: Option<PinnedCellId>,
}
