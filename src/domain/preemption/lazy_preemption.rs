use serde::Serialize;
use std::collections::BTreeSet;

use crate::domain::utils::id::PodGroupName;

/// Marker on a victim group: who wants its cells and until when it may keep running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LazyPreemptionStatus {
    pub preemptors: BTreeSet<PodGroupName>,
    pub marked_at: i64,
    /// Absolute time in seconds. Once reached, the victim is released by force.
    pub deadline: i64,
}

impl LazyPreemptionStatus {
    /// A fresh mark by `preemptor`, with the absolute `deadline` planned by the preemption engine.
    pub fn new(preemptor: PodGroupName, marked_at: i64, deadline: i64) -> Self {
        LazyPreemptionStatus { preemptors: BTreeSet::from([preemptor]), marked_at, deadline }
    }

    /// A further preemptor never extends the deadline already granted.
    pub fn add_preemptor(&mut self, preemptor: PodGroupName) -> bool {
        self.preemptors.insert(preemptor)
    }

    /// # Returns
    /// True if no preemptor is left, i.e. the mark should be lifted.
    pub fn remove_preemptor(&mut self, preemptor: &PodGroupName) -> bool {
        self.preemptors.remove(preemptor);
        self.preemptors.is_empty()
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.deadline
    }

    pub fn remaining_seconds(&self, now: i64) -> i64 {
        (self.deadline - now).max(0)
    }
}
