use bimap::BiMap;
use slotmap::SlotMap;
use std::collections::{BTreeMap, HashMap};

use crate::api::virtual_cluster_dto::VirtualClusterDto;
use crate::domain::reservation::{
    buddy_allocator::BuddyAllocator,
    virtual_cell::{VirtualCell, VirtualCellId},
};
use crate::domain::topology::{cell::CellId, cell_chain::CellLevel, cell_store::CellStore};
use crate::domain::utils::id::{ChainName, PinnedCellId, VirtualCellAddress, VirtualClusterName};
use crate::error::{Error, Result};

/// Reserved roots of one tenant.
#[derive(Debug, Clone)]
pub struct VirtualClusterReservation {
    pub name: VirtualClusterName,
    /// Non-pinned reserved roots per chain, in the order they were carved.
    reserved: BTreeMap<ChainName, Vec<VirtualCellId>>,
    pinned: BTreeMap<PinnedCellId, VirtualCellId>,
}

impl VirtualClusterReservation {
    pub fn reserved_roots(&self) -> impl Iterator<Item = VirtualCellId> + '_ {
        self.reserved.values().flatten().copied()
    }

    pub fn pinned_roots(&self) -> impl Iterator<Item = (&PinnedCellId, VirtualCellId)> + '_ {
        self.pinned.iter().map(|(id, &cell)| (id, cell))
    }
}

/// Per-tenant reserved slices of the topology.
///
/// Quotas are bound to concrete physical cells when the map is built, so every tenant's
/// reservation is a fixed set of disjoint subtrees. Each reserved subtree is mirrored by a tree
/// of virtual cells that gives the tenant its own coordinates.
#[derive(Debug)]
pub struct ReservationMap {
    virtual_cells: SlotMap<VirtualCellId, VirtualCell>,
    physical_binding: BiMap<VirtualCellId, CellId>,
    clusters: BTreeMap<VirtualClusterName, VirtualClusterReservation>,
}

struct QuotaRequest {
    virtual_cluster: VirtualClusterName,
    chain: ChainName,
    level: CellLevel,
    cell_number: u32,
}

impl ReservationMap {
    pub fn build(store: &CellStore, dtos: &[VirtualClusterDto]) -> Result<ReservationMap> {
        let mut map = ReservationMap { virtual_cells: SlotMap::with_key(), physical_binding: BiMap::new(), clusters: BTreeMap::new() };

        let mut sorted: Vec<&VirtualClusterDto> = dtos.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        for dto in &sorted {
            let name = VirtualClusterName::new(dto.name.clone());
            if map.clusters.contains_key(&name) {
                return Err(Error::ModelConstructionError(format!("Duplicate virtual cluster '{}'", name)));
            }
            map.clusters.insert(name.clone(), VirtualClusterReservation { name, reserved: BTreeMap::new(), pinned: BTreeMap::new() });
        }

        let mut allocators: BTreeMap<ChainName, BuddyAllocator> =
            store.chains().map(|chain| (chain.name.clone(), BuddyAllocator::new(store, &chain.name))).collect();

        // Pinned cells first, they are fixed by the physical configuration.
        for dto in &sorted {
            let vc = VirtualClusterName::new(dto.name.clone());
            for pinned_dto in &dto.pinned_cells {
                let pinned_cell_id = PinnedCellId::new(pinned_dto.pinned_cell_id.clone());
                let cell = store.pinned_cell(&pinned_cell_id).ok_or_else(|| {
                    Error::ModelConstructionError(format!("Virtual cluster '{}' pins unknown cell '{}'", vc, pinned_cell_id))
                })?;

                let chain = store.cell(cell).chain.clone();
                let claimed = allocators.get_mut(&chain).is_some_and(|buddy| buddy.claim(cell));
                if !claimed {
                    return Err(Error::ModelConstructionError(format!("Pinned cell '{}' overlaps another reservation", pinned_cell_id)));
                }

                let address = format!("{}/{}", vc, pinned_cell_id);
                let root = map.mirror_subtree(store, &vc, cell, None, address, Some(pinned_cell_id.clone()));
                if let Some(reservation) = map.clusters.get_mut(&vc) {
                    reservation.pinned.insert(pinned_cell_id, root);
                }
            }
        }

        // Then quotas: coarser levels first so large cells are not fragmented by small ones.
        let mut quotas: Vec<QuotaRequest> = Vec::new();
        for dto in &sorted {
            for virtual_cell in &dto.virtual_cells {
                let (chain, level) = resolve_cell_type(store, &virtual_cell.cell_type)?;
                quotas.push(QuotaRequest {
                    virtual_cluster: VirtualClusterName::new(dto.name.clone()),
                    chain,
                    level,
                    cell_number: virtual_cell.cell_number,
                });
            }
        }
        quotas.sort_by(|a, b| b.level.cmp(&a.level).then_with(|| a.virtual_cluster.cmp(&b.virtual_cluster)));

        for quota in quotas {
            let Some(buddy) = allocators.get_mut(&quota.chain) else {
                return Err(Error::ModelConstructionError(format!("Unknown chain '{}'", quota.chain)));
            };

            for _ in 0..quota.cell_number {
                let cell = buddy.allocate(quota.level).ok_or_else(|| {
                    Error::ModelConstructionError(format!(
                        "Virtual cluster '{}' requests more {} cells of chain '{}' than are available",
                        quota.virtual_cluster, quota.level, quota.chain
                    ))
                })?;

                let index = map.clusters.get(&quota.virtual_cluster).and_then(|r| r.reserved.get(&quota.chain)).map_or(0, |roots| roots.len());
                let address = format!("{}/{}/{}", quota.virtual_cluster, quota.chain, index);
                let root = map.mirror_subtree(store, &quota.virtual_cluster, cell, None, address, None);
                if let Some(reservation) = map.clusters.get_mut(&quota.virtual_cluster) {
                    reservation.reserved.entry(quota.chain.clone()).or_default().push(root);
                }
            }
        }

        log::info!(
            "Bound {} virtual cluster(s) onto {} reserved cells.",
            map.clusters.len(),
            map.clusters.values().map(|r| r.reserved_roots().count() + r.pinned.len()).sum::<usize>()
        );

        Ok(map)
    }

    fn mirror_subtree(
        &mut self,
        store: &CellStore,
        vc: &VirtualClusterName,
        physical: CellId,
        parent: Option<VirtualCellId>,
        address: String,
        pinned_cell_id: Option<PinnedCellId>,
    ) -> VirtualCellId {
        let cell = store.cell(physical);
        let id = self.virtual_cells.insert(VirtualCell {
            address: VirtualCellAddress::new(address.clone()),
            virtual_cluster: vc.clone(),
            chain: cell.chain.clone(),
            level: cell.level,
            physical,
            parent,
            children: Vec::new(),
            pinned_cell_id,
        });
        self.physical_binding.insert(id, physical);

        for (index, &child) in cell.children.iter().enumerate() {
            let child_id = self.mirror_subtree(store, vc, child, Some(id), format!("{}/{}", address, index), None);
            self.virtual_cells[id].children.push(child_id);
        }
        id
    }

    //-----------------------
    // --- Lookup Methods ---
    //-----------------------

    pub fn has_virtual_cluster(&self, vc: &VirtualClusterName) -> bool {
        self.clusters.contains_key(vc)
    }

    pub fn virtual_clusters(&self) -> impl Iterator<Item = &VirtualClusterReservation> {
        self.clusters.values()
    }

    pub fn virtual_cluster(&self, vc: &VirtualClusterName) -> Option<&VirtualClusterReservation> {
        self.clusters.get(vc)
    }

    /// Physical roots reserved for `vc` on `chain`, excluding pinned cells.
    pub fn reserved_subtree(&self, vc: &VirtualClusterName, chain: &ChainName) -> Vec<CellId> {
        self.clusters
            .get(vc)
            .and_then(|reservation| reservation.reserved.get(chain))
            .map(|roots| roots.iter().map(|&root| self.virtual_cells[root].physical).collect())
            .unwrap_or_default()
    }

    /// The physical cell behind `pinned_cell_id`, if it is pinned to `vc`.
    pub fn is_pinned(&self, vc: &VirtualClusterName, pinned_cell_id: &PinnedCellId) -> Option<CellId> {
        let reservation = self.clusters.get(vc)?;
        let root = reservation.pinned.get(pinned_cell_id)?;
        Some(self.virtual_cells[*root].physical)
    }

    /// Physical roots pinned to `vc`, keyed by pinned cell id.
    pub fn pinned_cells(&self, vc: &VirtualClusterName) -> Vec<(PinnedCellId, CellId)> {
        self.clusters
            .get(vc)
            .map(|reservation| reservation.pinned.iter().map(|(id, &root)| (id.clone(), self.virtual_cells[root].physical)).collect())
            .unwrap_or_default()
    }

    pub fn virtual_address(&self, cell: CellId) -> Option<&VirtualCellAddress> {
        self.virtual_cell_of(cell).map(|id| &self.virtual_cells[id].address)
    }

    pub fn virtual_cell(&self, id: VirtualCellId) -> &VirtualCell {
        &self.virtual_cells[id]
    }

    pub fn virtual_cell_of(&self, cell: CellId) -> Option<VirtualCellId> {
        self.physical_binding.get_by_right(&cell).copied()
    }

    pub fn physical_cell_of(&self, id: VirtualCellId) -> Option<CellId> {
        self.physical_binding.get_by_left(&id).copied()
    }

    /// Tenant whose reservation contains `cell`.
    pub fn owner_of(&self, cell: CellId) -> Option<&VirtualClusterName> {
        self.virtual_cell_of(cell).map(|id| &self.virtual_cells[id].virtual_cluster)
    }

    /// Leaves below `cell` reserved by tenants other than `vc`.
    pub fn foreign_reserved_leaves(&self, store: &CellStore, cell: CellId, vc: &VirtualClusterName) -> u32 {
        store.leaves(cell).into_iter().filter(|&leaf| self.owner_of(leaf).is_some_and(|owner| owner != vc)).count() as u32
    }

    /// Virtual subtree of `root` in pre-order.
    pub fn virtual_subtree(&self, root: VirtualCellId) -> Vec<VirtualCellId> {
        let mut result = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            result.push(id);
            stack.extend(self.virtual_cells[id].children.iter().rev().copied());
        }
        result
    }
}

/// Accepts `"<chain>.<type>"` or a bare type name that exists in exactly one chain.
fn resolve_cell_type(store: &CellStore, cell_type: &str) -> Result<(ChainName, CellLevel)> {
    if let Some((chain_name, type_name)) = cell_type.split_once('.') {
        let chain = store
            .chain(&ChainName::new(chain_name))
            .ok_or_else(|| Error::ModelConstructionError(format!("Unknown chain '{}' in cell type '{}'", chain_name, cell_type)))?;
        let level = chain
            .level_of_type(type_name)
            .ok_or_else(|| Error::ModelConstructionError(format!("Chain '{}' has no cell type '{}'", chain_name, type_name)))?;
        return Ok((chain.name.clone(), level));
    }

    let matches: Vec<(ChainName, CellLevel)> =
        store.chains().filter_map(|chain| chain.level_of_type(cell_type).map(|level| (chain.name.clone(), level))).collect();

    match matches.as_slice() {
        [single] => Ok(single.clone()),
        [] => Err(Error::ModelConstructionError(format!("Unknown cell type '{}'", cell_type))),
        _ => Err(Error::ModelConstructionError(format!("Cell type '{}' is ambiguous, qualify it as '<chain>.{}'", cell_type, cell_type))),
    }
}

/// Lookup table from physical cell to reserving tenant, used for status reporting.
pub fn reserved_by_index(map: &ReservationMap, store: &CellStore) -> HashMap<CellId, VirtualClusterName> {
    let mut index = HashMap::new();
    for reservation in map.virtual_clusters() {
        let roots = reservation.reserved_roots().chain(reservation.pinned_roots().map(|(_, root)| root));
        for root in roots {
            if let Some(physical) = map.physical_cell_of(root) {
                for cell in store.subtree(physical) {
                    index.insert(cell, reservation.name.clone());
                }
            }
        }
    }
    index
}
