//! `KubeCluster`: `ClusterClient` over the Kubernetes API.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::client::ClusterClient;
use crate::error::{ClusterError, ClusterResult, ResourceKind};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounds shared by every namespaced resource this client handles.
trait Namespaced:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> Namespaced for K where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// Control-plane client bound to one namespace.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
    namespace: String,
}

impl KubeCluster {
    /// Wrap an existing `kube::Client`.
    pub fn new(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// Build a client from the inferred configuration: the in-cluster
    /// service account when running in a pod, otherwise the local
    /// kubeconfig.
    pub async fn connect(namespace: impl Into<String>) -> ClusterResult<Self> {
        let mut config = kube::Config::infer()
            .await
            .map_err(|e| ClusterError::Config(e.to_string()))?;
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);
        let client = Client::try_from(config).map_err(|e| ClusterError::Config(e.to_string()))?;
        let cluster = Self::new(client, namespace);
        info!(namespace = %cluster.namespace, "cluster client connected");
        Ok(cluster)
    }

    fn api<K: Namespaced>(&self) -> Api<K> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    async fn create<K: Namespaced>(&self, kind: ResourceKind, obj: &K) -> ClusterResult<()> {
        let name = obj.name_any();
        self.api::<K>()
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| map_kube_error(kind, &name, e))?;
        debug!(%kind, %name, namespace = %self.namespace, "resource created");
        Ok(())
    }

    async fn get<K: Namespaced>(&self, kind: ResourceKind, name: &str) -> ClusterResult<Option<K>> {
        self.api::<K>()
            .get_opt(name)
            .await
            .map_err(|e| map_kube_error(kind, name, e))
    }

    async fn list<K: Namespaced>(&self, kind: ResourceKind, selector: &str) -> ClusterResult<Vec<K>> {
        let mut params = ListParams::default();
        if !selector.is_empty() {
            params = params.labels(selector);
        }
        let list = self
            .api::<K>()
            .list(&params)
            .await
            .map_err(|e| map_kube_error(kind, selector, e))?;
        Ok(list.items)
    }

    async fn delete<K: Namespaced>(&self, kind: ResourceKind, name: &str) -> ClusterResult<bool> {
        match self.api::<K>().delete(name, &DeleteParams::background()).await {
            Ok(_) => {
                debug!(%kind, %name, namespace = %self.namespace, "resource deleted");
                Ok(true)
            }
            Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(false),
            Err(e) => Err(map_kube_error(kind, name, e)),
        }
    }
}

/// Translate a kube error into the orchestrator's vocabulary. HTTP 409 is
/// the control plane's "already exists" conflict.
fn map_kube_error(kind: ResourceKind, name: &str, err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(resp) if resp.code == 409 => ClusterError::AlreadyExists {
            kind,
            name: name.to_string(),
        },
        kube::Error::Api(resp) => ClusterError::Rejected {
            kind,
            name: name.to_string(),
            code: resp.code,
            message: resp.message,
        },
        other => ClusterError::Transport(other.to_string()),
    }
}

#[async_trait]
impl ClusterClient for KubeCluster {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn create_workload(&self, workload: &Deployment) -> ClusterResult<()> {
        self.create(ResourceKind::Workload, workload).await
    }

    async fn get_workload(&self, name: &str) -> ClusterResult<Option<Deployment>> {
        self.get(ResourceKind::Workload, name).await
    }

    async fn list_workloads(&self, selector: &str) -> ClusterResult<Vec<Deployment>> {
        self.list(ResourceKind::Workload, selector).await
    }

    async fn delete_workload(&self, name: &str) -> ClusterResult<bool> {
        self.delete::<Deployment>(ResourceKind::Workload, name).await
    }

    async fn create_service(&self, service: &Service) -> ClusterResult<()> {
        self.create(ResourceKind::Service, service).await
    }

    async fn get_service(&self, name: &str) -> ClusterResult<Option<Service>> {
        self.get(ResourceKind::Service, name).await
    }

    async fn delete_service(&self, name: &str) -> ClusterResult<bool> {
        self.delete::<Service>(ResourceKind::Service, name).await
    }

    async fn create_job(&self, job: &Job) -> ClusterResult<()> {
        self.create(ResourceKind::Job, job).await
    }

    async fn get_job(&self, name: &str) -> ClusterResult<Option<Job>> {
        self.get(ResourceKind::Job, name).await
    }

    async fn list_jobs(&self, selector: &str) -> ClusterResult<Vec<Job>> {
        self.list(ResourceKind::Job, selector).await
    }

    async fn delete_job(&self, name: &str) -> ClusterResult<bool> {
        self.delete::<Job>(ResourceKind::Job, name).await
    }

    async fn create_secret(&self, secret: &Secret) -> ClusterResult<()> {
        self.create(ResourceKind::Secret, secret).await
    }

    async fn list_secrets(&self, selector: &str) -> ClusterResult<Vec<Secret>> {
        self.list(ResourceKind::Secret, selector).await
    }

    async fn delete_secret(&self, name: &str) -> ClusterResult<bool> {
        self.delete::<Secret>(ResourceKind::Secret, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("status {code}"),
            reason: String::new(),
            code,
        })
    }

    #[test]
    fn conflict_maps_to_already_exists() {
        let err = map_kube_error(ResourceKind::Job, "j", api_error(409));
        assert!(err.is_conflict());
    }

    #[test]
    fn other_api_errors_are_rejections() {
        let err = map_kube_error(ResourceKind::Workload, "w", api_error(403));
        match err {
            ClusterError::Rejected { kind, name, code, .. } => {
                assert_eq!(kind, ResourceKind::Workload);
                assert_eq!(name, "w");
                assert_eq!(code, 403);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
