use crate::api::scheduler_config_dto::SchedulerConfigDto;
use crate::domain::placement::candidate::{CandidateOrdering, SearchConfig};

/// Scheduling policy knobs. Immutable for the lifetime of a `Scheduler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub grace_period_seconds: i64,
    pub candidate_ordering: CandidateOrdering,
    pub max_commit_retries: u32,
    pub allow_shared_fallback: bool,
}

impl SchedulerConfig {
    pub fn from_dto(dto: &SchedulerConfigDto) -> Self {
        SchedulerConfig {
            grace_period_seconds: dto.grace_period_seconds.max(0),
            candidate_ordering: CandidateOrdering::from_dto(dto.candidate_ordering),
            max_commit_retries: dto.max_commit_retries,
            allow_shared_fallback: dto.allow_shared_fallback,
        }
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig { ordering: self.candidate_ordering, allow_shared_fallback: self.allow_shared_fallback }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig::from_dto(&SchedulerConfigDto::default())
    }
}
