use serde::Serialize;
use std::fmt;

/// Lifecycle of one pod group inside the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PodGroupState {
    Pending,
    Searching,
    Allocated,
    /// Waiting for lower-priority victims to drain.
    PreemptionPending,
    /// No placement exists, not even with preemption. Left only by resubmission.
    Infeasible,
    Releasing,
    /// Chosen as a victim; its grace period starts right after.
    PreemptionVictim,
    GracePeriod,
    Released,
}

impl PodGroupState {
    pub fn can_transition_to(self, next: PodGroupState) -> bool {
        use PodGroupState::*;
        matches!(
            (self, next),
            (Pending, Searching | Released)
                | (Searching, Allocated | PreemptionPending | Infeasible | Released)
                | (PreemptionPending, Searching | Released)
                | (Infeasible, Pending | Released)
                | (Allocated, Releasing | PreemptionVictim)
                | (PreemptionVictim, GracePeriod | Allocated | Releasing)
                | (GracePeriod, Releasing | Allocated)
                | (Releasing, Released)
                | (Released, Pending)
        )
    }

    /// Whether the group currently holds cells.
    pub fn holds_cells(self) -> bool {
        matches!(self, PodGroupState::Allocated | PodGroupState::PreemptionVictim | PodGroupState::GracePeriod | PodGroupState::Releasing)
    }

    pub fn is_waiting(self) -> bool {
        matches!(self, PodGroupState::Pending | PodGroupState::Searching | PodGroupState::PreemptionPending)
    }
}

impl fmt::Display for PodGroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::PodGroupState::*;
    use super::*;

    const ALL: [PodGroupState; 9] = [Pending, Searching, Allocated, PreemptionPending, Infeasible, Releasing, PreemptionVictim, GracePeriod, Released];

    #[test]
    fn happy_paths_are_allowed() {
        let placed = [Pending, Searching, Allocated, Releasing, Released];
        let preempted = [Allocated, PreemptionVictim, GracePeriod, Releasing, Released];
        let waiting = [Pending, Searching, PreemptionPending, Searching, Allocated];

        for path in [&placed[..], &preempted[..], &waiting[..]] {
            for step in path.windows(2) {
                assert!(step[0].can_transition_to(step[1]), "{} -> {}", step[0], step[1]);
            }
        }
    }

    #[test]
    fn infeasible_is_left_only_by_resubmission_or_withdrawal() {
        let allowed: Vec<PodGroupState> = ALL.into_iter().filter(|&s| Infeasible.can_transition_to(s)).collect();
        assert_eq!(allowed, vec![Pending, Released]);
    }

    #[test]
    fn released_groups_never_hold_cells() {
        assert!(!Released.holds_cells());
        assert!(!Released.can_transition_to(Allocated));
        assert!(!Allocated.can_transition_to(Released));
    }
}
