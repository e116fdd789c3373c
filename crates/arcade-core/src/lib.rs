//! arcade-core: shared vocabulary for the player workload orchestrator.
//!
//! - [`PlayerId`] and [`CloudCredentials`] describe who a workload belongs to
//!   and what it may touch in the external cloud.
//! - [`Naming`] is the stable contract that turns a player id into resource
//!   names, labels, and selectors. Provisioning and reclamation both go
//!   through it so lookups stay consistent.
//! - [`ArcadeConfig`] is the `arcade.toml` configuration.

pub mod config;
pub mod naming;
pub mod types;

pub use config::ArcadeConfig;
pub use naming::{CloudJobAction, Naming};
pub use types::*;
