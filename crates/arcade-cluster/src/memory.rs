//! `InMemoryCluster`: a process-local control plane.
//!
//! Behaves like the real control plane where the orchestrator depends on
//! it: names are unique per kind (a duplicate create is a conflict), name
//! and label lengths are validated, lists honour equality selectors, and
//! deletes report whether anything existed. Tests drive status from the
//! outside: set a workload's ready replicas, mark a job succeeded, make
//! creates of a named resource fail, or make reads of a kind fail.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentStatus};
use k8s_openapi::api::batch::v1::{Job, JobStatus};
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::{Resource, ResourceExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::client::ClusterClient;
use crate::error::{ClusterError, ClusterResult, ResourceKind};
use crate::selector::LabelSelector;

/// Failure to inject into a create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateFailure {
    /// Respond with the already-exists conflict.
    Conflict,
    /// Respond with a rejection carrying this HTTP status.
    Rejected(u16),
}

#[derive(Default)]
struct Inner {
    workloads: BTreeMap<String, Deployment>,
    services: BTreeMap<String, Service>,
    jobs: BTreeMap<String, Job>,
    secrets: BTreeMap<String, Secret>,
    create_failures: HashMap<(ResourceKind, String), CreateFailure>,
    read_failures: HashSet<ResourceKind>,
    complete_jobs_on_create: bool,
    writes: usize,
}

/// Thread-safe in-memory control plane. Clones share state.
#[derive(Clone)]
pub struct InMemoryCluster {
    namespace: String,
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryCluster {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Report every job as succeeded as soon as it is created.
    pub async fn complete_jobs_on_create(&self, enabled: bool) {
        self.inner.lock().await.complete_jobs_on_create = enabled;
    }

    /// Make every create of `kind`/`name` fail with `failure` until cleared.
    pub async fn fail_create(&self, kind: ResourceKind, name: &str, failure: CreateFailure) {
        self.inner
            .lock()
            .await
            .create_failures
            .insert((kind, name.to_string()), failure);
    }

    pub async fn clear_create_failures(&self) {
        self.inner.lock().await.create_failures.clear();
    }

    /// Make every get and list of `kind` fail with a transport error while
    /// `failing` is set.
    pub async fn fail_reads(&self, kind: ResourceKind, failing: bool) {
        let mut inner = self.inner.lock().await;
        if failing {
            inner.read_failures.insert(kind);
        } else {
            inner.read_failures.remove(&kind);
        }
    }

    /// Set a workload's ready-replica count. Returns false if it is missing.
    pub async fn set_ready_replicas(&self, name: &str, ready: i32) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.workloads.get_mut(name) {
            Some(workload) => {
                workload.status = Some(DeploymentStatus {
                    ready_replicas: Some(ready),
                    replicas: Some(ready.max(1)),
                    ..DeploymentStatus::default()
                });
                true
            }
            None => false,
        }
    }

    /// Mark a job succeeded. Returns false if it is missing.
    pub async fn complete_job(&self, name: &str) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.jobs.get_mut(name) {
            Some(job) => {
                mark_succeeded(job);
                true
            }
            None => false,
        }
    }

    /// Number of create/delete calls received, failed ones included.
    pub async fn write_count(&self) -> usize {
        self.inner.lock().await.writes
    }

    pub async fn workload_names(&self) -> Vec<String> {
        self.inner.lock().await.workloads.keys().cloned().collect()
    }

    pub async fn service_names(&self) -> Vec<String> {
        self.inner.lock().await.services.keys().cloned().collect()
    }

    pub async fn job_names(&self) -> Vec<String> {
        self.inner.lock().await.jobs.keys().cloned().collect()
    }

    pub async fn secret_names(&self) -> Vec<String> {
        self.inner.lock().await.secrets.keys().cloned().collect()
    }
}

fn mark_succeeded(job: &mut Job) {
    let status = job.status.get_or_insert_with(JobStatus::default);
    status.succeeded = Some(1);
    status.active = None;
}

fn insert_unique<K: Resource + Clone>(
    table: &mut BTreeMap<String, K>,
    kind: ResourceKind,
    obj: &K,
) -> ClusterResult<()> {
    let name = obj.name_any();
    if table.contains_key(&name) {
        return Err(ClusterError::AlreadyExists { kind, name });
    }
    table.insert(name, obj.clone());
    Ok(())
}

fn select<K: Resource + Clone>(table: &BTreeMap<String, K>, selector: &str) -> Vec<K> {
    let selector = LabelSelector::parse(selector);
    table
        .values()
        .filter(|obj| selector.matches(obj.meta().labels.as_ref()))
        .cloned()
        .collect()
}

/// Longest DNS-1123 label: Service and Job names, and label values.
const MAX_LABEL_LEN: usize = 63;
/// Longest DNS-1123 subdomain: Deployment and Secret names.
const MAX_SUBDOMAIN_LEN: usize = 253;

/// Reject what the real control plane rejects on length.
fn validate_lengths<K: Resource>(kind: ResourceKind, obj: &K) -> ClusterResult<()> {
    let name = obj.name_any();
    let name_limit = match kind {
        ResourceKind::Service | ResourceKind::Job => MAX_LABEL_LEN,
        ResourceKind::Workload | ResourceKind::Secret => MAX_SUBDOMAIN_LEN,
    };
    let rejected = |message: String| ClusterError::Rejected {
        kind,
        name: name.clone(),
        code: 422,
        message,
    };
    if name.len() > name_limit {
        return Err(rejected(format!("name must be no more than {name_limit} characters")));
    }
    for (key, value) in obj.meta().labels.iter().flatten() {
        if value.len() > MAX_LABEL_LEN {
            return Err(rejected(format!(
                "label {key} must be no more than {MAX_LABEL_LEN} characters"
            )));
        }
    }
    Ok(())
}

impl Inner {
    fn check_read(&self, kind: ResourceKind) -> ClusterResult<()> {
        if self.read_failures.contains(&kind) {
            return Err(ClusterError::Transport(format!("injected {kind} read failure")));
        }
        Ok(())
    }

    fn check_create<K: Resource>(&mut self, kind: ResourceKind, obj: &K) -> ClusterResult<()> {
        self.writes += 1;
        let name = obj.name_any();
        validate_lengths(kind, obj)?;
        match self.create_failures.get(&(kind, name.clone())) {
            None => Ok(()),
            Some(CreateFailure::Conflict) => Err(ClusterError::AlreadyExists { kind, name }),
            Some(CreateFailure::Rejected(code)) => Err(ClusterError::Rejected {
                kind,
                name,
                code: *code,
                message: "injected failure".to_string(),
            }),
        }
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn create_workload(&self, workload: &Deployment) -> ClusterResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check_create(ResourceKind::Workload, workload)?;
        insert_unique(&mut inner.workloads, ResourceKind::Workload, workload)?;
        debug!(name = %workload.name_any(), "in-memory workload created");
        Ok(())
    }

    async fn get_workload(&self, name: &str) -> ClusterResult<Option<Deployment>> {
        let inner = self.inner.lock().await;
        inner.check_read(ResourceKind::Workload)?;
        Ok(inner.workloads.get(name).cloned())
    }

    async fn list_workloads(&self, selector: &str) -> ClusterResult<Vec<Deployment>> {
        let inner = self.inner.lock().await;
        inner.check_read(ResourceKind::Workload)?;
        Ok(select(&inner.workloads, selector))
    }

    async fn delete_workload(&self, name: &str) -> ClusterResult<bool> {
        let mut inner = self.inner.lock().await;
        inner.writes += 1;
        Ok(inner.workloads.remove(name).is_some())
    }

    async fn create_service(&self, service: &Service) -> ClusterResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check_create(ResourceKind::Service, service)?;
        insert_unique(&mut inner.services, ResourceKind::Service, service)
    }

    async fn get_service(&self, name: &str) -> ClusterResult<Option<Service>> {
        let inner = self.inner.lock().await;
        inner.check_read(ResourceKind::Service)?;
        Ok(inner.services.get(name).cloned())
    }

    async fn delete_service(&self, name: &str) -> ClusterResult<bool> {
        let mut inner = self.inner.lock().await;
        inner.writes += 1;
        Ok(inner.services.remove(name).is_some())
    }

    async fn create_job(&self, job: &Job) -> ClusterResult<()> {
        let mut inner = self.inner.lock().await;
        let name = job.name_any();
        inner.check_create(ResourceKind::Job, job)?;
        insert_unique(&mut inner.jobs, ResourceKind::Job, job)?;
        if inner.complete_jobs_on_create {
            if let Some(stored) = inner.jobs.get_mut(&name) {
                mark_succeeded(stored);
            }
        }
        debug!(%name, "in-memory job created");
        Ok(())
    }

    async fn get_job(&self, name: &str) -> ClusterResult<Option<Job>> {
        let inner = self.inner.lock().await;
        inner.check_read(ResourceKind::Job)?;
        Ok(inner.jobs.get(name).cloned())
    }

    async fn list_jobs(&self, selector: &str) -> ClusterResult<Vec<Job>> {
        let inner = self.inner.lock().await;
        inner.check_read(ResourceKind::Job)?;
        Ok(select(&inner.jobs, selector))
    }

    async fn delete_job(&self, name: &str) -> ClusterResult<bool> {
        let mut inner = self.inner.lock().await;
        inner.writes += 1;
        Ok(inner.jobs.remove(name).is_some())
    }

    async fn create_secret(&self, secret: &Secret) -> ClusterResult<()> {
        let mut inner = self.inner.lock().await;
        inner.check_create(ResourceKind::Secret, secret)?;
        insert_unique(&mut inner.secrets, ResourceKind::Secret, secret)
    }

    async fn list_secrets(&self, selector: &str) -> ClusterResult<Vec<Secret>> {
        let inner = self.inner.lock().await;
        inner.check_read(ResourceKind::Secret)?;
        Ok(select(&inner.secrets, selector))
    }

    async fn delete_secret(&self, name: &str) -> ClusterResult<bool> {
        let mut inner = self.inner.lock().await;
        inner.writes += 1;
        Ok(inner.secrets.remove(name).is_some())
    }
}
