//! Error types for control-plane access.

use std::fmt;

use thiserror::Error;

/// Result type alias for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// The four resource kinds the orchestrator manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Workload,
    Service,
    Job,
    Secret,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Workload => "deployment",
            ResourceKind::Service => "service",
            ResourceKind::Job => "job",
            ResourceKind::Secret => "secret",
        })
    }
}

/// Errors that can occur while talking to the control plane.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{kind} {name:?} already exists")]
    AlreadyExists { kind: ResourceKind, name: String },

    #[error("{kind} {name:?} rejected by control plane ({code}): {message}")]
    Rejected {
        kind: ResourceKind,
        name: String,
        code: u16,
        message: String,
    },

    #[error("control plane transport error: {0}")]
    Transport(String),

    #[error("cluster client configuration error: {0}")]
    Config(String),
}

impl ClusterError {
    /// True for the "resource already exists" conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClusterError::AlreadyExists { .. })
    }
}
