pub mod allocated_pod_group;
pub mod allocation;
pub mod allocation_tracker;
pub mod occupancy;
