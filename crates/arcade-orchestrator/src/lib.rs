//! arcade-orchestrator: per-player workload lifecycle.
//!
//! On registration a player gets a gameplay cabinet (Workload + Service)
//! and a run-to-completion job that provisions their cloud monitoring
//! resources. A waiting page polls readiness until the cabinet serves
//! traffic. Separately, the reclaimer destroys cloud state whose cleanup
//! never provably ran.
//!
//! # Architecture
//!
//! ```text
//! PlayerLifecycle (registration + readiness facade)
//!   ├── EnvironmentProvisioner   Workload + Service per player
//!   ├── CloudProvisioner         apply Job per player
//!   └── ReadinessPoller          ready replicas > 0, no retry loop
//!
//! OrphanReclaimer (batch)
//!   ├── list state secrets → submit destroy Jobs (all first)
//!   ├── JobWaiter per Job (bounded, fails closed)
//!   └── delete secrets whose destroy provably ran
//! ```
//!
//! Every component receives its `SharedCluster` explicitly.

pub mod cloud;
pub mod environment;
pub mod error;
pub mod lifecycle;
pub mod readiness;
pub mod reclaim;
mod resources;
pub mod waiter;

pub use cloud::{CloudJobBuilder, CloudProvisioner};
pub use environment::EnvironmentProvisioner;
pub use error::{OrchestratorError, OrchestratorResult};
pub use lifecycle::PlayerLifecycle;
pub use readiness::ReadinessPoller;
pub use reclaim::{OrphanReclaimer, ReclaimReport, RetainReason, RetainedSecret};
pub use waiter::JobWaiter;
