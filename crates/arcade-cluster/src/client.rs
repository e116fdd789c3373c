//! The `ClusterClient` trait.

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Secret, Service};

use crate::error::ClusterResult;

/// Shared handle passed to every orchestrator component.
pub type SharedCluster = Arc<dyn ClusterClient>;

/// Create / list / read / delete access to the four resource kinds,
/// scoped to a single namespace.
///
/// `get_*` returns `Ok(None)` for a missing resource and `delete_*` returns
/// `Ok(false)`; absence is not an error. Selectors are equality label
/// selectors (`k=v,k=v`).
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Namespace this client operates in.
    fn namespace(&self) -> &str;

    // ── Workloads ───────────────────────────────────────────────────

    async fn create_workload(&self, workload: &Deployment) -> ClusterResult<()>;
    async fn get_workload(&self, name: &str) -> ClusterResult<Option<Deployment>>;
    async fn list_workloads(&self, selector: &str) -> ClusterResult<Vec<Deployment>>;
    async fn delete_workload(&self, name: &str) -> ClusterResult<bool>;

    // ── Services ────────────────────────────────────────────────────

    async fn create_service(&self, service: &Service) -> ClusterResult<()>;
    async fn get_service(&self, name: &str) -> ClusterResult<Option<Service>>;
    async fn delete_service(&self, name: &str) -> ClusterResult<bool>;

    // ── Jobs ────────────────────────────────────────────────────────

    async fn create_job(&self, job: &Job) -> ClusterResult<()>;
    async fn get_job(&self, name: &str) -> ClusterResult<Option<Job>>;
    async fn list_jobs(&self, selector: &str) -> ClusterResult<Vec<Job>>;
    async fn delete_job(&self, name: &str) -> ClusterResult<bool>;

    // ── Secrets ─────────────────────────────────────────────────────

    async fn create_secret(&self, secret: &Secret) -> ClusterResult<()>;
    async fn list_secrets(&self, selector: &str) -> ClusterResult<Vec<Secret>>;
    async fn delete_secret(&self, name: &str) -> ClusterResult<bool>;
}
