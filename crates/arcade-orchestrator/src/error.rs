//! Orchestrator error types.

use thiserror::Error;

use arcade_cluster::ClusterError;
use arcade_core::PlayerIdError;

/// Errors surfaced to callers of the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The player id cannot be provisioned under the configured prefix.
    #[error("invalid player: {0}")]
    InvalidPlayer(#[from] PlayerIdError),

    #[error("control plane error: {0}")]
    Cluster(#[from] ClusterError),
}

impl OrchestratorError {
    /// True when the control plane reported "already exists".
    pub fn is_conflict(&self) -> bool {
        match self {
            OrchestratorError::Cluster(e) => e.is_conflict(),
            OrchestratorError::InvalidPlayer(_) => false,
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
