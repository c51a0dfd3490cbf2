use serde::Serialize;

use crate::domain::request::scheduling_request::PodGroupSchedulingRequest;
use crate::domain::reservation::reservation_map::ReservationMap;
use crate::domain::topology::{cell::CellId, cell_store::CellStore};
use crate::error::{Error, Result};

/// Which part of the chain a placement was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SearchScope {
    /// Inside the pinned subtree named by the request.
    Pinned,
    /// Inside the requesting tenant's reserved cells.
    Reserved,
    /// Anywhere on the chain.
    Shared,
}

/// How a request is searched. Chosen once per request, before any cell is looked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStrategy {
    Pinned { root: CellId },
    VirtualFirst { reserved: Vec<CellId>, shared_fallback: bool },
    Opportunistic,
}

impl SearchStrategy {
    /// Validates the request's references and picks the strategy.
    ///
    /// # Returns
    /// `ConfigMismatch` for an unknown chain, virtual cluster or pinned cell, a pinned cell on a
    /// different chain, or a priority outside the accepted range.
    pub fn select(request: &PodGroupSchedulingRequest, store: &CellStore, reservations: &ReservationMap, allow_shared_fallback: bool) -> Result<SearchStrategy> {
        if store.chain(&request.chain).is_none() {
            return Err(Error::ConfigMismatch(format!("Unknown chain {} requested by {}", request.chain, request.name())));
        }
        if !reservations.has_virtual_cluster(&request.virtual_cluster) {
            return Err(Error::ConfigMismatch(format!("Unknown virtual cluster {} requested by {}", request.virtual_cluster, request.name())));
        }
        if !request.priority.is_valid_request_priority() {
            return Err(Error::ConfigMismatch(format!("Priority {} of {} is out of range", request.priority, request.name())));
        }

        if let Some(pinned_cell_id) = &request.pinned_cell_id {
            let root = reservations.is_pinned(&request.virtual_cluster, pinned_cell_id).ok_or_else(|| {
                Error::ConfigMismatch(format!("Pinned cell {} is not reserved for virtual cluster {}", pinned_cell_id, request.virtual_cluster))
            })?;
            if store.cell(root).chain != request.chain {
                return Err(Error::ConfigMismatch(format!("Pinned cell {} does not belong to chain {}", pinned_cell_id, request.chain)));
            }
            return Ok(SearchStrategy::Pinned { root });
        }

        if request.priority.is_opportunistic() {
            return Ok(SearchStrategy::Opportunistic);
        }

        Ok(SearchStrategy::VirtualFirst { reserved: reservations.reserved_subtree(&request.virtual_cluster, &request.chain), shared_fallback: allow_shared_fallback })
    }

    /// Candidate universes in the order they are tried.
    pub fn scopes(&self, store: &CellStore, request: &PodGroupSchedulingRequest) -> Vec<(SearchScope, Vec<CellId>)> {
        let whole_chain = store.top_cells(&request.chain).to_vec();
        match self {
            SearchStrategy::Pinned { root } => vec![(SearchScope::Pinned, vec![*root])],
            SearchStrategy::VirtualFirst { reserved, shared_fallback } => {
                let mut scopes = Vec::new();
                if !reserved.is_empty() {
                    scopes.push((SearchScope::Reserved, reserved.clone()));
                }
                if *shared_fallback {
                    scopes.push((SearchScope::Shared, whole_chain));
                }
                scopes
            }
            SearchStrategy::Opportunistic => vec![(SearchScope::Shared, whole_chain)],
        }
    }
}
