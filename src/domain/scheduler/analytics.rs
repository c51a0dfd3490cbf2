//! Structured scheduling events. Every decision the scheduler takes is emitted once on
//! `ANALYTICS_TARGET` so it can be routed to its own sink (see `logger::init_analytics`).

use crate::domain::scheduler::scheduling_status::PodGroupSchedulingStatus;
use crate::domain::utils::id::PodGroupName;

pub const ANALYTICS_TARGET: &str = "hived_scheduler::analytics";

pub fn log_placed(status: &PodGroupSchedulingStatus, cell_count: usize, leaf_count: u32, now: i64) {
    tracing::info!(
        target: ANALYTICS_TARGET,
        Time = now,
        LogDescription = "Pod group placed",
        PodGroup = %status.group,
        VirtualCluster = %status.virtual_cluster,
        Chain = %status.chain,
        Priority = status.priority.0,
        State = %status.state,
        Scope = ?status.scope,
        CellCount = cell_count,
        LeafCount = leaf_count,
    );
}

pub fn log_restored(status: &PodGroupSchedulingStatus, cell_count: usize, now: i64) {
    tracing::info!(
        target: ANALYTICS_TARGET,
        Time = now,
        LogDescription = "Pod group restored",
        PodGroup = %status.group,
        VirtualCluster = %status.virtual_cluster,
        Chain = %status.chain,
        Priority = status.priority.0,
        CellCount = cell_count,
    );
}

pub fn log_preemption_required(status: &PodGroupSchedulingStatus, now: i64) {
    tracing::info!(
        target: ANALYTICS_TARGET,
        Time = now,
        LogDescription = "Preemption required",
        PodGroup = %status.group,
        VirtualCluster = %status.virtual_cluster,
        Chain = %status.chain,
        Priority = status.priority.0,
        VictimCount = status.victims.len(),
        Deadline = status.preemption_deadline.unwrap_or(now),
    );
}

pub fn log_infeasible(status: &PodGroupSchedulingStatus, now: i64) {
    tracing::info!(
        target: ANALYTICS_TARGET,
        Time = now,
        LogDescription = "Pod group infeasible",
        PodGroup = %status.group,
        VirtualCluster = %status.virtual_cluster,
        Chain = %status.chain,
        Priority = status.priority.0,
        Reason = status.infeasible_reason.as_deref().unwrap_or(""),
    );
}

pub fn log_victim_marked(victim: &PodGroupSchedulingStatus, preemptor: &PodGroupName, deadline: i64, now: i64) {
    tracing::info!(
        target: ANALYTICS_TARGET,
        Time = now,
        LogDescription = "Victim marked",
        PodGroup = %victim.group,
        Priority = victim.priority.0,
        Preemptor = %preemptor,
        Deadline = deadline,
        PodsUnderPreemption = victim.pods_under_preemption.len(),
    );
}

pub fn log_preemption_cancelled(victim: &PodGroupSchedulingStatus, now: i64) {
    tracing::info!(
        target: ANALYTICS_TARGET,
        Time = now,
        LogDescription = "Preemption cancelled",
        PodGroup = %victim.group,
        Priority = victim.priority.0,
    );
}

pub fn log_forced_release(victim: &PodGroupSchedulingStatus, deadline: i64, now: i64) {
    tracing::warn!(
        target: ANALYTICS_TARGET,
        Time = now,
        LogDescription = "PreemptionTimeout, victim released by force",
        PodGroup = %victim.group,
        Priority = victim.priority.0,
        Deadline = deadline,
    );
}

pub fn log_released(status: &PodGroupSchedulingStatus, now: i64) {
    tracing::info!(
        target: ANALYTICS_TARGET,
        Time = now,
        LogDescription = "Pod group released",
        PodGroup = %status.group,
        VirtualCluster = %status.virtual_cluster,
        Chain = %status.chain,
        Priority = status.priority.0,
    );
}
