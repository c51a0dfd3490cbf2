use std::collections::BTreeMap;

use crate::domain::topology::{cell::CellId, cell_chain::CellLevel, cell_store::CellStore};
use crate::domain::utils::id::ChainName;

/// Free lists per level used to carve tenant reservations out of one chain.
///
/// Requests at a level are served from that level's free list; when it is empty a free cell one
/// level up is split into its children. Lists are kept in pre-order so the carving is deterministic.
#[derive(Debug)]
pub struct BuddyAllocator<'a> {
    store: &'a CellStore,
    chain: ChainName,
    free: BTreeMap<CellLevel, Vec<CellId>>,
}

impl<'a> BuddyAllocator<'a> {
    pub fn new(store: &'a CellStore, chain: &ChainName) -> Self {
        let mut free: BTreeMap<CellLevel, Vec<CellId>> = BTreeMap::new();
        for &top in store.top_cells(chain) {
            free.entry(store.cell(top).level).or_default().push(top);
        }
        BuddyAllocator { store, chain: chain.clone(), free }
    }

    pub fn chain(&self) -> &ChainName {
        &self.chain
    }

    /// Takes one free cell of `level`, splitting coarser cells as needed.
    pub fn allocate(&mut self, level: CellLevel) -> Option<CellId> {
        if let Some(cell) = self.pop_first(level) {
            return Some(cell);
        }

        let top = self.store.chain(&self.chain)?.top_level();
        if level >= top {
            return None;
        }

        let parent = self.allocate(level.higher())?;
        self.insert_sorted(level, self.store.cell(parent).children.clone());
        self.pop_first(level)
    }

    /// Claims a specific cell (used for pinned cells). Fails if any part of it was already handed out.
    pub fn claim(&mut self, cell: CellId) -> bool {
        let mut path: Vec<CellId> = vec![cell];
        path.extend(self.store.ancestors(cell));

        let Some(free_index) = path.iter().position(|&c| self.is_free(c)) else {
            return false;
        };
        let free_ancestor = path[free_index];
        self.remove(free_ancestor);

        // Split down the path, returning every sibling of the path to the free lists.
        for window in path[..=free_index].windows(2).rev() {
            let (below, above) = (window[0], window[1]);
            let siblings: Vec<CellId> = self.store.cell(above).children.iter().copied().filter(|&c| c != below).collect();
            self.insert_sorted(self.store.cell(below).level, siblings);
        }
        true
    }

    fn is_free(&self, cell: CellId) -> bool {
        let level = self.store.cell(cell).level;
        self.free.get(&level).is_some_and(|cells| cells.contains(&cell))
    }

    fn remove(&mut self, cell: CellId) {
        let level = self.store.cell(cell).level;
        if let Some(cells) = self.free.get_mut(&level) {
            cells.retain(|&c| c != cell);
        }
    }

    fn pop_first(&mut self, level: CellLevel) -> Option<CellId> {
        let cells = self.free.get_mut(&level)?;
        if cells.is_empty() { None } else { Some(cells.remove(0)) }
    }

    fn insert_sorted(&mut self, level: CellLevel, cells: Vec<CellId>) {
        let list = self.free.entry(level).or_default();
        list.extend(cells);
        list.sort_by_key(|&c| self.store.cell(c).order);
    }
}
