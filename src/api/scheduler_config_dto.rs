use serde::{Deserialize, Serialize};

use crate::api::{physical_cluster_dto::PhysicalClusterDto, virtual_cluster_dto::VirtualClusterDto};

#[derive(Debug, Deserialize, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CandidateOrderingDto {
    #[default]
    BestFit,
    Address,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfigDto {
    #[serde(default = "default_grace_period_seconds")]
    pub grace_period_seconds: i64,
    #[serde(default)]
    pub candidate_ordering: CandidateOrderingDto,
    #[serde(default = "default_max_commit_retries")]
    pub max_commit_retries: u32,
    #[serde(default = "default_allow_shared_fallback")]
    pub allow_shared_fallback: bool,
}

fn default_grace_period_seconds() -> i64 {
    30
}

fn default_max_commit_retries() -> u32 {
    3
}

fn default_allow_shared_fallback() -> bool {
    true
}

impl Default for SchedulerConfigDto {
    fn default() -> Self {
        SchedulerConfigDto {
            grace_period_seconds: default_grace_period_seconds(),
            candidate_ordering: CandidateOrderingDto::default(),
            max_commit_retries: default_max_commit_retries(),
            allow_shared_fallback: default_allow_shared_fallback(),
        }
    }
}

/// Root configuration document: topology, tenant reservations and scheduling policy.
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfigDto {
    pub physical_cluster: PhysicalClusterDto,
    #[serde(default)]
    pub virtual_clusters: Vec<VirtualClusterDto>,
    #[serde(default)]
    pub scheduler: SchedulerConfigDto,
}
