pub mod cluster_status_dto;
pub mod physical_cluster_dto;
pub mod pod_group_dto;
pub mod scheduler_config_dto;
pub mod virtual_cluster_dto;
