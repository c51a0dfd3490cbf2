use thiserror::Error;

use crate::domain::scheduler::pod_group_state::PodGroupState;

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse cluster configuration JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    /// The topology or reservation descriptors are inconsistent (e.g. quota exceeds capacity).
    #[error("Failed to build scheduler model: {0}")]
    ModelConstructionError(String),

    /// The request references an unknown chain, virtual cluster, pinned cell or cell type.
    #[error("Request does not match cluster configuration: {0}")]
    ConfigMismatch(String),

    #[error("No placement exists for the request: {0}")]
    Infeasible(String),

    /// A cell was claimed by another allocation between snapshot and commit.
    #[error("Commit conflict on cell {cell}")]
    CommitConflict { cell: String },

    #[error("Unknown pod group: {0}")]
    UnknownPodGroup(String),

    #[error("Pod group {0} is already allocated")]
    AlreadyAllocated(String),

    #[error("Pod group {group} cannot move from {from:?} to {to:?}")]
    InvalidTransition { group: String, from: PodGroupState, to: PodGroupState },

    #[error("Pod binding does not match placement: {0}")]
    PodBindingMismatch(String),
}

pub type Result<T> = std::result::Result<T, Error>;
