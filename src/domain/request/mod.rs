pub mod pod_group_spec;
pub mod priority;
pub mod scheduling_request;
