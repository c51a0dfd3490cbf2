use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling priority of a pod group and, once committed, of the cells it occupies.
///
/// Guaranteed work uses `0..=1000`. The opportunistic priority runs on whatever is idle and is
/// preempted by any guaranteed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellPriority(pub i32);

impl CellPriority {
    /// Priority of a cell nobody occupies. Lower than anything a request can carry.
    pub const FREE: CellPriority = CellPriority(-2);
    pub const OPPORTUNISTIC: CellPriority = CellPriority(-1);
    pub const MIN_GUARANTEED: CellPriority = CellPriority(0);
    pub const MAX_GUARANTEED: CellPriority = CellPriority(1000);

    pub fn is_opportunistic(self) -> bool {
        self == CellPriority::OPPORTUNISTIC
    }

    pub fn is_valid_request_priority(self) -> bool {
        self.is_opportunistic() || (CellPriority::MIN_GUARANTEED..=CellPriority::MAX_GUARANTEED).contains(&self)
    }

    /// Whether work at `self` may be evicted in favour of `other`.
    pub fn is_preemptible_by(self, other: CellPriority) -> bool {
        self < other
    }
}

impl fmt::Display for CellPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
