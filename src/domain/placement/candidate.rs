use serde::Serialize;

use crate::api::scheduler_config_dto::CandidateOrderingDto;
use crate::domain::request::priority::CellPriority;

/// Tie-break policy among cells that could all host a demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CandidateOrdering {
    /// Tightest fit first: avoid victims, avoid other tenants' reservations, then fill the fullest
    /// cell under the fullest parent.
    #[default]
    BestFit,
    /// Avoid victims, otherwise plain topology order.
    Address,
}

impl CandidateOrdering {
    pub fn from_dto(dto: CandidateOrderingDto) -> Self {
        match dto {
            CandidateOrderingDto::BestFit => CandidateOrdering::BestFit,
            CandidateOrderingDto::Address => CandidateOrdering::Address,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    pub ordering: CandidateOrdering,
    pub allow_shared_fallback: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig { ordering: CandidateOrdering::BestFit, allow_shared_fallback: true }
    }
}

/// What the search knows about one candidate container cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateFacts {
    /// Highest priority that would have to be evicted, `CellPriority::FREE` when nothing.
    pub victim_priority: CellPriority,
    pub victim_leaves: u32,
    pub foreign_reserved_leaves: u32,
    pub free_leaves: u32,
    pub parent_free_leaves: u32,
    pub order: usize,
}

/// Sort key of a candidate; smaller is better. Total, so identical state always gives identical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CandidateKey(CellPriority, u32, u32, u32, u32, usize);

impl CandidateOrdering {
    pub fn key(self, facts: &CandidateFacts) -> CandidateKey {
        match self {
            CandidateOrdering::BestFit => CandidateKey(
                facts.victim_priority,
                facts.victim_leaves,
                facts.foreign_reserved_leaves,
                facts.free_leaves,
                facts.parent_free_leaves,
                facts.order,
            ),
            CandidateOrdering::Address => CandidateKey(facts.victim_priority, facts.victim_leaves, 0, 0, 0, facts.order),
        }
    }
}
