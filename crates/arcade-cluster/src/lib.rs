//! arcade-cluster: handle to the cluster control plane.
//!
//! The orchestrator only ever talks to the control plane through the
//! [`ClusterClient`] trait, so every component receives its client
//! explicitly and tests can swap in [`InMemoryCluster`].
//!
//! # Backends
//!
//! ```text
//! ClusterClient (trait, object safe)
//!   ├── KubeCluster      kube::Client, one namespace
//!   └── InMemoryCluster  process-local maps, failure injection
//! ```
//!
//! The control plane is eventually consistent on listing and at-least-once
//! on writes. A create that collides with an existing name is reported as
//! [`ClusterError::AlreadyExists`]; callers decide whether that matters.

pub mod client;
pub mod error;
pub mod kubernetes;
pub mod memory;
pub mod selector;

pub use client::{ClusterClient, SharedCluster};
pub use error::{ClusterError, ClusterResult, ResourceKind};
pub use kubernetes::KubeCluster;
pub use memory::{CreateFailure, InMemoryCluster};
