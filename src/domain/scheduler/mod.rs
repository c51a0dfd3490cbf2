pub mod analytics;
pub mod pod_group_state;
pub mod reconciler;
pub mod scheduler;
pub mod scheduler_config;
pub mod scheduling_status;
