//! Registration and readiness entry points for the web layer.

use std::sync::Arc;

use tracing::info;

use arcade_cluster::SharedCluster;
use arcade_core::{ArcadeConfig, CloudCredentials, PlayerId};

use crate::cloud::CloudProvisioner;
use crate::environment::EnvironmentProvisioner;
use crate::error::OrchestratorResult;
use crate::readiness::ReadinessPoller;

/// Bundles the components a registration flow and a waiting page need.
#[derive(Clone)]
pub struct PlayerLifecycle {
    config: Arc<ArcadeConfig>,
    environment: EnvironmentProvisioner,
    cloud: CloudProvisioner,
    readiness: ReadinessPoller,
    credentials: CloudCredentials,
}

impl PlayerLifecycle {
    pub fn new(
        cluster: SharedCluster,
        config: Arc<ArcadeConfig>,
        credentials: CloudCredentials,
    ) -> Self {
        Self {
            environment: EnvironmentProvisioner::new(cluster.clone(), config.clone()),
            cloud: CloudProvisioner::new(cluster.clone(), config.clone()),
            readiness: ReadinessPoller::new(cluster, config.clone()),
            config,
            credentials,
        }
    }

    pub fn config(&self) -> &ArcadeConfig {
        &self.config
    }

    /// Provision the cabinet, then submit the cloud apply Job. The first
    /// failure is returned; nothing already created is rolled back.
    pub async fn register(&self, player: &PlayerId) -> OrchestratorResult<()> {
        self.environment.ensure_environment(player).await?;
        self.cloud
            .ensure_cloud_resources(player, &self.credentials)
            .await?;
        info!(%player, "player provisioned");
        Ok(())
    }

    pub async fn is_ready(&self, player: &PlayerId) -> bool {
        self.readiness.is_environment_ready(player).await
    }

    /// Where a ready player should be sent, if an ingress host is set.
    pub fn player_url(&self, player: &PlayerId) -> Option<String> {
        self.config
            .cabinet
            .ingress_host
            .as_ref()
            .map(|host| format!("http://{host}/player/{player}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{cluster, player, test_config};
    use arcade_cluster::{CreateFailure, ResourceKind};

    #[tokio::test]
    async fn alice_registers_and_becomes_ready() {
        let (mem, shared) = cluster();
        let lifecycle = PlayerLifecycle::new(shared, test_config(), CloudCredentials::default());
        let alice = player("alice");

        lifecycle.register(&alice).await.unwrap();
        assert_eq!(mem.workload_names().await, vec!["app-player-alice"]);
        assert_eq!(mem.service_names().await, vec!["app-cabinet-player-alice"]);
        assert_eq!(mem.job_names().await, vec!["app-player-alice-cloud"]);

        assert!(!lifecycle.is_ready(&alice).await);
        mem.set_ready_replicas("app-player-alice", 1).await;
        assert!(lifecycle.is_ready(&alice).await);
    }

    #[tokio::test]
    async fn environment_failure_skips_cloud_job() {
        let (mem, shared) = cluster();
        mem.fail_create(
            ResourceKind::Workload,
            "app-player-alice",
            CreateFailure::Rejected(403),
        )
        .await;
        let lifecycle = PlayerLifecycle::new(shared, test_config(), CloudCredentials::default());

        assert!(lifecycle.register(&player("alice")).await.is_err());
        assert!(mem.job_names().await.is_empty());
    }

    #[test]
    fn player_url_needs_ingress_host() {
        let (_mem, shared) = cluster();
        let mut config = (*test_config()).clone();
        let lifecycle =
            PlayerLifecycle::new(shared.clone(), Arc::new(config.clone()), CloudCredentials::default());
        assert_eq!(lifecycle.player_url(&player("alice")), None);

        config.cabinet.ingress_host = Some("arcade.example.com".to_string());
        let lifecycle = PlayerLifecycle::new(shared, Arc::new(config), CloudCredentials::default());
        assert_eq!(
            lifecycle.player_url(&player("alice")).as_deref(),
            Some("http://arcade.example.com/player/alice")
        );
    }
}
