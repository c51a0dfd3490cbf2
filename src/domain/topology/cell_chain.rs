use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::api::physical_cluster_dto::CellTypeSpecDto;
use crate::domain::utils::id::{CellTypeName, ChainName};
use crate::error::{Error, Result};

/// Level of a cell inside its chain. Level 1 is the leaf (a single device),
/// each step upwards is one coarser resource boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CellLevel(pub u8);

impl CellLevel {
    pub const LEAF: CellLevel = CellLevel(1);

    pub fn lower(self) -> Option<CellLevel> {
        if self.0 > 1 { Some(CellLevel(self.0 - 1)) } else { None }
    }

    pub fn higher(self) -> CellLevel {
        CellLevel(self.0 + 1)
    }
}

impl fmt::Display for CellLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ChainLevel {
    pub cell_type: CellTypeName,
    /// Number of direct children of a cell at this level (0 for leaves).
    pub child_number: u32,
    /// Number of leaf cells below (or equal to) a cell at this level.
    pub leaf_number: u32,
}

/// A self-consistent topology variant, named after its top-level cell type.
///
/// The chain fixes the level ordering and the split factor of every level, so that a parent's
/// capacity is exactly the union of its children's.
#[derive(Debug, Clone)]
pub struct CellChain {
    pub name: ChainName,
    /// Index 0 holds level 1.
    levels: Vec<ChainLevel>,
    node_level: CellLevel,
}

impl CellChain {
    /// Walks the cell type specs from `top_type` down to the leaf type.
    pub fn from_cell_types(top_type: &str, cell_types: &BTreeMap<String, CellTypeSpecDto>) -> Result<CellChain> {
        let mut top_down: Vec<(String, u32, bool)> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut current = top_type.to_string();

        loop {
            if !visited.insert(current.clone()) {
                return Err(Error::ModelConstructionError(format!("Cell type '{}' appears twice in chain '{}'", current, top_type)));
            }

            let spec = cell_types
                .get(&current)
                .ok_or_else(|| Error::ModelConstructionError(format!("Unknown cell type '{}' in chain '{}'", current, top_type)))?;

            match &spec.child_cell_type {
                Some(child) => {
                    if spec.child_cell_number == 0 {
                        return Err(Error::ModelConstructionError(format!("Cell type '{}' has a child type but zero children", current)));
                    }
                    top_down.push((current.clone(), spec.child_cell_number, spec.is_node_level));
                    current = child.clone();
                }
                None => {
                    top_down.push((current.clone(), 0, spec.is_node_level));
                    break;
                }
            }
        }

        if top_down.len() > u8::MAX as usize {
            return Err(Error::ModelConstructionError(format!("Chain '{}' is too deep", top_type)));
        }

        let mut levels: Vec<ChainLevel> = Vec::with_capacity(top_down.len());
        let mut node_level: Option<CellLevel> = None;
        for (index, (cell_type, child_number, is_node_level)) in top_down.into_iter().rev().enumerate() {
            let leaf_number = match levels.last() {
                None => 1,
                Some(below) => below.leaf_number * child_number,
            };
            if is_node_level && node_level.is_none() {
                node_level = Some(CellLevel(index as u8 + 1));
            }
            levels.push(ChainLevel { cell_type: CellTypeName::new(cell_type), child_number, leaf_number });
        }

        let top_level = CellLevel(levels.len() as u8);

        Ok(CellChain { name: ChainName::new(top_type), levels, node_level: node_level.unwrap_or(top_level) })
    }

    pub fn top_level(&self) -> CellLevel {
        CellLevel(self.levels.len() as u8)
    }

    /// Lowest level that represents a whole machine; pods never span more than one such cell.
    pub fn node_level(&self) -> CellLevel {
        self.node_level
    }

    pub fn contains_level(&self, level: CellLevel) -> bool {
        level.0 >= 1 && level <= self.top_level()
    }

    pub fn level(&self, level: CellLevel) -> Option<&ChainLevel> {
        if level.0 == 0 {
            return None;
        }
        self.levels.get(level.0 as usize - 1)
    }

    pub fn level_of_type(&self, cell_type: &str) -> Option<CellLevel> {
        self.levels.iter().position(|l| l.cell_type.as_str() == cell_type).map(|index| CellLevel(index as u8 + 1))
    }

    pub fn cell_type_at(&self, level: CellLevel) -> Option<&CellTypeName> {
        self.level(level).map(|l| &l.cell_type)
    }

    pub fn leaf_number(&self, level: CellLevel) -> u32 {
        self.level(level).map(|l| l.leaf_number).unwrap_or(0)
    }

    pub fn child_number(&self, level: CellLevel) -> u32 {
        self.level(level).map(|l| l.child_number).unwrap_or(0)
    }

    /// How many level-`inner` cells fit into one level-`outer` cell.
    pub fn cells_within(&self, outer: CellLevel, inner: CellLevel) -> u32 {
        if outer < inner {
            return 0;
        }
        self.leaf_number(outer) / self.leaf_number(inner).max(1)
    }

    /// Smallest level whose cells can hold `cell_number` cells of `level`.
    pub fn smallest_level_holding(&self, level: CellLevel, cell_number: u32) -> Option<CellLevel> {
        let mut candidate = level;
        while candidate <= self.top_level() {
            if self.cells_within(candidate, level) >= cell_number {
                return Some(candidate);
            }
            candidate = candidate.higher();
        }
        None
    }
}
