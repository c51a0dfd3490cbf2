use bimap::BiMap;
use slotmap::SlotMap;
use std::collections::{BTreeMap, HashMap};

use crate::api::physical_cluster_dto::{PhysicalCellSpecDto, PhysicalClusterDto};
use crate::domain::topology::{
    cell::{CellId, PhysicalCell},
    cell_chain::{CellChain, CellLevel},
};
use crate::domain::utils::id::{CellAddress, ChainName, PinnedCellId};
use crate::error::{Error, Result};

/// Arena of all physical cells plus the lookup indices the scheduler needs.
///
/// The store is immutable once built; it is shared read-only between the reservation map,
/// the search engine and the allocation tracker.
#[derive(Debug)]
pub struct CellStore {
    cells: SlotMap<CellId, PhysicalCell>,
    addresses: BiMap<CellAddress, CellId>,
    chains: BTreeMap<ChainName, CellChain>,
    top_cells: BTreeMap<ChainName, Vec<CellId>>,
    by_level: HashMap<(ChainName, CellLevel), Vec<CellId>>,
    pinned: BTreeMap<PinnedCellId, CellId>,
}

impl CellStore {
    fn new() -> Self {
        CellStore {
            cells: SlotMap::with_key(),
            addresses: BiMap::new(),
            chains: BTreeMap::new(),
            top_cells: BTreeMap::new(),
            by_level: HashMap::new(),
            pinned: BTreeMap::new(),
        }
    }

    pub fn from_dto(dto: &PhysicalClusterDto) -> Result<CellStore> {
        let mut store = CellStore::new();

        for spec in &dto.physical_cells {
            let top_type = spec
                .cell_type
                .as_deref()
                .ok_or_else(|| Error::ModelConstructionError("Top-level physical cell without cellType".to_string()))?;

            if !store.chains.contains_key(&ChainName::new(top_type)) {
                let chain = CellChain::from_cell_types(top_type, &dto.cell_types)?;
                store.chains.insert(chain.name.clone(), chain);
            }
            let chain = store.chains[&ChainName::new(top_type)].clone();

            let address = spec
                .cell_address
                .clone()
                .ok_or_else(|| Error::ModelConstructionError(format!("Top-level cell of type '{}' has no cellAddress", top_type)))?;

            let id = store.build_cell(&chain, spec, chain.top_level(), None, address)?;
            store.top_cells.entry(chain.name.clone()).or_default().push(id);
        }

        if store.cells.is_empty() {
            return Err(Error::ModelConstructionError("Physical cluster contains no cells".to_string()));
        }

        log::info!("Built cell topology with {} cells in {} chain(s).", store.cells.len(), store.chains.len());

        Ok(store)
    }

    fn build_cell(
        &mut self,
        chain: &CellChain,
        spec: &PhysicalCellSpecDto,
        level: CellLevel,
        parent: Option<CellId>,
        address: String,
    ) -> Result<CellId> {
        let cell_type = chain
            .cell_type_at(level)
            .cloned()
            .ok_or_else(|| Error::ModelConstructionError(format!("Chain '{}' has no level {}", chain.name, level)))?;

        if let Some(declared) = &spec.cell_type {
            if declared != cell_type.as_str() {
                return Err(Error::ModelConstructionError(format!(
                    "Cell '{}' declares type '{}' but chain '{}' expects '{}' at {}",
                    address, declared, chain.name, cell_type, level
                )));
            }
        }

        let address = CellAddress::new(address);
        if self.addresses.contains_left(&address) {
            return Err(Error::ModelConstructionError(format!("Duplicate cell address '{}'", address)));
        }

        let pinned_cell_id = spec.pinned_cell_id.clone().map(PinnedCellId::new);
        if let Some(pinned) = &pinned_cell_id {
            if self.pinned.contains_key(pinned) {
                return Err(Error::ModelConstructionError(format!("Duplicate pinned cell id '{}'", pinned)));
            }
        }

        let id = self.cells.insert(PhysicalCell {
            address: address.clone(),
            chain: chain.name.clone(),
            cell_type,
            level,
            parent,
            children: Vec::new(),
            leaf_number: chain.leaf_number(level),
            pinned_cell_id: pinned_cell_id.clone(),
            order: self.cells.len(),
        });

        self.addresses.insert(address.clone(), id);
        self.by_level.entry((chain.name.clone(), level)).or_default().push(id);
        if let Some(pinned) = pinned_cell_id {
            self.pinned.insert(pinned, id);
        }

        match level.lower() {
            Some(child_level) => {
                let child_number = chain.child_number(level) as usize;
                if !spec.cell_children.is_empty() && spec.cell_children.len() != child_number {
                    return Err(Error::ModelConstructionError(format!(
                        "Cell '{}' lists {} children but its type requires {}",
                        address,
                        spec.cell_children.len(),
                        child_number
                    )));
                }

                let generated = PhysicalCellSpecDto::default();
                for index in 0..child_number {
                    let child_spec = spec.cell_children.get(index).unwrap_or(&generated);
                    let child_address = child_spec.cell_address.clone().unwrap_or_else(|| format!("{}/{}", address, index));
                    let child = self.build_cell(chain, child_spec, child_level, Some(id), child_address)?;
                    self.cells[id].children.push(child);
                }
            }
            None => {
                if !spec.cell_children.is_empty() {
                    return Err(Error::ModelConstructionError(format!("Leaf cell '{}' must not have children", address)));
                }
            }
        }

        Ok(id)
    }

    //-----------------------
    // --- Lookup Methods ---
    //-----------------------

    /// Ids handed out by this store are always valid, so indexing cannot fail for them.
    pub fn cell(&self, id: CellId) -> &PhysicalCell {
        &self.cells[id]
    }

    pub fn get(&self, id: CellId) -> Option<&PhysicalCell> {
        self.cells.get(id)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn find_by_address(&self, address: &str) -> Option<CellId> {
        self.addresses.get_by_left(&CellAddress::new(address)).copied()
    }

    pub fn address(&self, id: CellId) -> &CellAddress {
        &self.cells[id].address
    }

    pub fn chain(&self, name: &ChainName) -> Option<&CellChain> {
        self.chains.get(name)
    }

    pub fn chains(&self) -> impl Iterator<Item = &CellChain> {
        self.chains.values()
    }

    pub fn top_cells(&self, chain: &ChainName) -> &[CellId] {
        self.top_cells.get(chain).map(|cells| cells.as_slice()).unwrap_or(&[])
    }

    /// All cells of `level` in `chain`, in pre-order.
    pub fn cells_at_level(&self, chain: &ChainName, level: CellLevel) -> &[CellId] {
        self.by_level.get(&(chain.clone(), level)).map(|cells| cells.as_slice()).unwrap_or(&[])
    }

    pub fn pinned_cell(&self, pinned_cell_id: &PinnedCellId) -> Option<CellId> {
        self.pinned.get(pinned_cell_id).copied()
    }

    pub fn level_of_type(&self, chain: &ChainName, cell_type: &str) -> Option<CellLevel> {
        self.chains.get(chain)?.level_of_type(cell_type)
    }

    //---------------------------
    // --- Navigation Methods ---
    //---------------------------

    pub fn parent(&self, id: CellId) -> Option<CellId> {
        self.cells[id].parent
    }

    pub fn children(&self, id: CellId) -> &[CellId] {
        &self.cells[id].children
    }

    pub fn leaf_count(&self, id: CellId) -> u32 {
        self.cells[id].leaf_number
    }

    /// Ancestors of `id`, nearest first. Does not include `id` itself.
    pub fn ancestors(&self, id: CellId) -> Vec<CellId> {
        let mut ancestors = Vec::new();
        let mut current = self.cells[id].parent;
        while let Some(parent) = current {
            ancestors.push(parent);
            current = self.cells[parent].parent;
        }
        ancestors
    }

    /// The cell at `level` containing `id` (or `id` itself when it is at that level).
    pub fn ancestor_at_level(&self, id: CellId, level: CellLevel) -> Option<CellId> {
        let mut current = Some(id);
        while let Some(cell_id) = current {
            let cell = &self.cells[cell_id];
            if cell.level == level {
                return Some(cell_id);
            }
            if cell.level > level {
                return None;
            }
            current = cell.parent;
        }
        None
    }

    pub fn is_ancestor_or_self(&self, ancestor: CellId, id: CellId) -> bool {
        let level = self.cells[ancestor].level;
        self.ancestor_at_level(id, level) == Some(ancestor)
    }

    /// `id` and all cells below it, in pre-order.
    pub fn subtree(&self, id: CellId) -> Vec<CellId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(cell_id) = stack.pop() {
            result.push(cell_id);
            stack.extend(self.cells[cell_id].children.iter().rev().copied());
        }
        result
    }

    /// Cells of `level` inside the subtree of `id`, in pre-order.
    pub fn descendants_at_level(&self, id: CellId, level: CellLevel) -> Vec<CellId> {
        let root_level = self.cells[id].level;
        if level > root_level {
            return Vec::new();
        }
        if level == root_level {
            return vec![id];
        }

        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(cell_id) = stack.pop() {
            let cell = &self.cells[cell_id];
            if cell.level == level {
                result.push(cell_id);
            } else {
                stack.extend(cell.children.iter().rev().copied());
            }
        }
        result
    }

    pub fn leaves(&self, id: CellId) -> Vec<CellId> {
        self.descendants_at_level(id, CellLevel::LEAF)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parser::parse_json_str;

    fn two_node_cluster() -> PhysicalClusterDto {
        parse_json_str(
            r#"{
                "cellTypes": {
                    "GPU": {},
                    "SWITCH": { "childCellType": "GPU", "childCellNumber": 2 },
                    "NODE": { "childCellType": "SWITCH", "childCellNumber": 2, "isNodeLevel": true },
                    "RACK": { "childCellType": "NODE", "childCellNumber": 2 }
                },
                "physicalCells": [
                    { "cellType": "RACK", "cellAddress": "rack0", "cellChildren": [
                        { "cellAddress": "node-a" },
                        { "cellAddress": "node-b", "cellChildren": [ { "pinnedCellId": "pin-1" }, {} ] }
                    ] }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn builds_the_full_tree_with_generated_addresses() {
        let store = CellStore::from_dto(&two_node_cluster()).unwrap();
        let chain = ChainName::new("RACK");

        assert_eq!(store.len(), 1 + 2 + 4 + 8);
        assert_eq!(store.cells_at_level(&chain, CellLevel(1)).len(), 8);
        assert!(store.find_by_address("node-a/1/0").is_some());

        let pinned = store.pinned_cell(&PinnedCellId::new("pin-1")).unwrap();
        assert_eq!(store.address(pinned).as_str(), "node-b/0");
        assert_eq!(store.cell(pinned).level, CellLevel(2));
    }

    #[test]
    fn parent_capacity_is_the_union_of_its_children() {
        let store = CellStore::from_dto(&two_node_cluster()).unwrap();
        let chain = ChainName::new("RACK");

        for level in 2..=4u8 {
            for &id in store.cells_at_level(&chain, CellLevel(level)) {
                let cell = store.cell(id);
                let children_leaves: u32 = cell.children.iter().map(|&c| store.cell(c).leaf_number).sum();
                assert_eq!(cell.leaf_number, children_leaves);
                assert_eq!(store.leaves(id).len() as u32, cell.leaf_number);
            }
        }
    }

    #[test]
    fn navigation_helpers_agree() {
        let store = CellStore::from_dto(&two_node_cluster()).unwrap();
        let leaf = store.find_by_address("node-b/1/1").unwrap();
        let node = store.find_by_address("node-b").unwrap();
        let rack = store.find_by_address("rack0").unwrap();

        assert_eq!(store.ancestor_at_level(leaf, CellLevel(3)), Some(node));
        assert_eq!(store.ancestors(leaf).last().copied(), Some(rack));
        assert!(store.is_ancestor_or_self(node, leaf));
        assert!(!store.is_ancestor_or_self(leaf, node));
        assert_eq!(store.subtree(node).len(), 7);
        assert_eq!(store.subtree(rack)[0], rack);

        assert_eq!(store.parent(node), Some(rack));
        assert_eq!(store.children(node).len(), 2);
        assert_eq!(store.leaf_count(node), 4);
        assert_eq!(store.level_of_type(&ChainName::new("RACK"), "SWITCH"), Some(CellLevel(2)));
        assert_eq!(store.level_of_type(&ChainName::new("NODE"), "SWITCH"), None);
    }

    #[test]
    fn duplicate_addresses_are_rejected() {
        let mut dto = two_node_cluster();
        dto.physical_cells.push(dto.physical_cells[0].clone());

        assert!(matches!(CellStore::from_dto(&dto), Err(Error::ModelConstructionError(_))));
    }

    #[test]
    fn wrong_child_count_is_rejected() {
        let mut dto = two_node_cluster();
        dto.physical_cells[0].cell_children.pop();

        assert!(CellStore::from_dto(&dto).is_err());
    }
}
