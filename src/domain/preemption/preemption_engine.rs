use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeSet;

use crate::domain::allocation::allocation::AllocationId;
use crate::domain::allocation::occupancy::OccupancySnapshot;
use crate::domain::placement::search_engine::{Placement, PlacementSearchEngine};
use crate::domain::request::priority::CellPriority;
use crate::domain::request::scheduling_request::PodGroupSchedulingRequest;
use crate::domain::utils::id::PodGroupName;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreemptionVictim {
    #[serde(skip)]
    pub allocation: AllocationId,
    pub group: PodGroupName,
    pub priority: CellPriority,
    pub leaf_number: u32,
}

/// Victims to mark and the placement the preemptor gets once they are gone.
#[derive(Debug, Clone)]
pub struct PreemptionPlan {
    /// Lowest priority first, then smallest.
    pub victims: Vec<PreemptionVictim>,
    pub placement: Placement,
    pub deadline: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct PreemptionEngine {
    grace_period_seconds: i64,
}

impl PreemptionEngine {
    pub fn new(grace_period_seconds: i64) -> Self {
        PreemptionEngine { grace_period_seconds }
    }

    /// Turns a blocking set reported by the search into a minimal victim set.
    ///
    /// Victims are dropped one at a time, highest priority and largest first, as long as the
    /// request still fits without them. Only allocations from `blockers` are ever considered.
    ///
    /// # Returns
    /// `Error::Infeasible` if a blocker is not strictly lower priority than the request, which
    /// means the request cannot be served by preemption.
    pub fn plan(
        &self,
        search: &PlacementSearchEngine<'_>,
        request: &PodGroupSchedulingRequest,
        snapshot: &OccupancySnapshot,
        placement: Placement,
        blockers: &BTreeSet<AllocationId>,
        now: i64,
    ) -> Result<PreemptionPlan> {
        let mut candidates = Vec::new();
        for &id in blockers {
            let Some(summary) = snapshot.allocation(id) else { continue };
            if !summary.priority.is_preemptible_by(request.priority) {
                log::warn!("Refusing to preempt {} (priority {}) for {} (priority {}).", summary.group, summary.priority, request.name(), request.priority);
                return Err(Error::Infeasible(format!("blocked by {} at equal or higher priority {}", summary.group, summary.priority)));
            }
            candidates.push(PreemptionVictim { allocation: id, group: summary.group.clone(), priority: summary.priority, leaf_number: summary.leaf_number });
        }

        let mut kept: BTreeSet<AllocationId> = candidates.iter().map(|v| v.allocation).collect();
        let mut drop_order = candidates.clone();
        drop_order.sort_by_key(|v| (Reverse(v.priority), Reverse(v.leaf_number), v.group.clone()));

        let mut best = search.place_with_evictions(request, snapshot, &kept)?;
        for victim in &drop_order {
            if kept.len() == 1 {
                break;
            }
            let mut trial = kept.clone();
            trial.remove(&victim.allocation);
            if let Some(found) = search.place_with_evictions(request, snapshot, &trial)? {
                log::debug!("{} does not need to preempt {}.", request.name(), victim.group);
                kept = trial;
                best = Some(found);
            }
        }

        let mut victims: Vec<PreemptionVictim> = candidates.into_iter().filter(|v| kept.contains(&v.allocation)).collect();
        victims.sort_by_key(|v| (v.priority, v.leaf_number, v.group.clone()));

        Ok(PreemptionPlan { victims, placement: best.unwrap_or(placement), deadline: now + self.grace_period_seconds.max(0) })
    }
}
