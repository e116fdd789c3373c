//! Player cloud resource provisioner.
//!
//! Cloud-side monitoring resources are managed by a declarative
//! infrastructure tool running inside a run-to-completion Job. The tool
//! keeps its state in a per-player secret; the Job's service account must
//! be allowed to read and write it.

use std::sync::Arc;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{Container, EnvVar, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, info};

use arcade_cluster::SharedCluster;
use arcade_core::{ArcadeConfig, CloudCredentials, CloudJobAction, Naming, PlayerId};

use crate::error::OrchestratorResult;
use crate::resources;

/// Builds apply and destroy Jobs for the infrastructure tool.
#[derive(Debug, Clone)]
pub struct CloudJobBuilder {
    config: Arc<ArcadeConfig>,
    naming: Naming,
}

impl CloudJobBuilder {
    pub fn new(config: Arc<ArcadeConfig>) -> Self {
        let naming = config.naming();
        Self { config, naming }
    }

    /// Job name for `player` and `action`.
    pub fn job_name(&self, player: &PlayerId, action: CloudJobAction) -> String {
        self.naming.cloud_job_name(player, action)
    }

    /// Build the Job. Inputs reach the tool as its own input variables.
    pub fn build(
        &self,
        player: &PlayerId,
        credentials: &CloudCredentials,
        action: CloudJobAction,
    ) -> Job {
        let cloud = &self.config.cloud;
        let labels = self.naming.cloud_job_labels(player, action);

        let command = match action {
            CloudJobAction::Apply => cloud.apply_command.clone(),
            CloudJobAction::Destroy => Some(cloud.destroy_command.clone()),
        };

        let container = Container {
            name: "player-cloud".to_string(),
            image: Some(cloud.image.clone()),
            image_pull_policy: Some(cloud.image_pull_policy.clone()),
            resources: Some(resources::requirements(&cloud.resources)),
            command,
            env: Some(vec![
                var("TF_VAR_api_token", &credentials.token),
                var("TF_VAR_realm", &credentials.realm),
                var("TF_VAR_player_name", player.as_str()),
                var("KUBE_NAMESPACE", &self.config.namespace),
            ]),
            ..Container::default()
        };

        Job {
            metadata: ObjectMeta {
                name: Some(self.job_name(player, action)),
                namespace: Some(self.config.namespace.clone()),
                labels: Some(labels.clone()),
                ..ObjectMeta::default()
            },
            spec: Some(JobSpec {
                ttl_seconds_after_finished: Some(
                    i32::try_from(cloud.ttl_seconds_after_finished).unwrap_or(i32::MAX),
                ),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..ObjectMeta::default()
                    }),
                    spec: Some(PodSpec {
                        restart_policy: Some("Never".to_string()),
                        service_account_name: Some(self.config.cloud_service_account()),
                        containers: vec![container],
                        ..PodSpec::default()
                    }),
                },
                ..JobSpec::default()
            }),
            ..Job::default()
        }
    }
}

fn var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..EnvVar::default()
    }
}

/// Submits the apply Job for a player. Does not wait for it.
#[derive(Clone)]
pub struct CloudProvisioner {
    cluster: SharedCluster,
    config: Arc<ArcadeConfig>,
    jobs: CloudJobBuilder,
}

impl CloudProvisioner {
    pub fn new(cluster: SharedCluster, config: Arc<ArcadeConfig>) -> Self {
        let jobs = CloudJobBuilder::new(config.clone());
        Self {
            cluster,
            config,
            jobs,
        }
    }

    /// Ensure the player's apply Job has been submitted.
    ///
    /// Reserved players are skipped. Control-plane failures are returned
    /// as-is.
    pub async fn ensure_cloud_resources(
        &self,
        player: &PlayerId,
        credentials: &CloudCredentials,
    ) -> OrchestratorResult<()> {
        if self.config.is_reserved(player) {
            debug!(%player, "reserved player, cloud resources provisioned out of band");
            return Ok(());
        }
        self.config.naming().check_player(player)?;

        let job = self.jobs.build(player, credentials, CloudJobAction::Apply);
        self.cluster.create_job(&job).await?;
        info!(
            %player,
            job = %self.jobs.job_name(player, CloudJobAction::Apply),
            "cloud apply job submitted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{cluster, player, test_config};
    use arcade_cluster::ClusterClient;

    fn creds() -> CloudCredentials {
        CloudCredentials::new("tok", "us1")
    }

    fn env_of(job: &Job) -> Vec<(String, String)> {
        job.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0]
            .env
            .as_ref()
            .unwrap()
            .iter()
            .map(|v| (v.name.clone(), v.value.clone().unwrap_or_default()))
            .collect()
    }

    #[tokio::test]
    async fn submits_one_apply_job() {
        let (mem, shared) = cluster();
        let provisioner = CloudProvisioner::new(shared, test_config());

        provisioner
            .ensure_cloud_resources(&player("alice"), &creds())
            .await
            .unwrap();

        assert_eq!(mem.job_names().await, vec!["app-player-alice-cloud"]);
        assert_eq!(mem.write_count().await, 1);
        let job = mem.get_job("app-player-alice-cloud").await.unwrap().unwrap();
        assert!(job.status.is_none());
    }

    #[tokio::test]
    async fn reserved_player_performs_no_writes() {
        let (mem, shared) = cluster();
        let provisioner = CloudProvisioner::new(shared, test_config());

        provisioner
            .ensure_cloud_resources(&player("devplayer"), &creds())
            .await
            .unwrap();

        assert_eq!(mem.write_count().await, 0);
    }

    #[tokio::test]
    async fn over_long_player_submits_nothing() {
        let (mem, shared) = cluster();
        let provisioner = CloudProvisioner::new(shared, test_config());
        let max = test_config().naming().max_player_id_len();

        let err = provisioner
            .ensure_cloud_resources(&player(&"a".repeat(max + 1)), &creds())
            .await
            .unwrap_err();
        assert!(!err.is_conflict());
        assert_eq!(mem.write_count().await, 0);
    }

    #[test]
    fn job_shape() {
        let builder = CloudJobBuilder::new(test_config());
        let job = builder.build(&player("alice"), &creds(), CloudJobAction::Apply);
        let spec = job.spec.as_ref().unwrap();
        assert_eq!(spec.ttl_seconds_after_finished, Some(60));

        let pod = spec.template.spec.as_ref().unwrap();
        assert_eq!(pod.restart_policy.as_deref(), Some("Never"));
        assert_eq!(
            pod.service_account_name.as_deref(),
            Some("app-service-account")
        );
        assert_eq!(pod.containers[0].command, None);

        let env = env_of(&job);
        assert!(env.contains(&("TF_VAR_player_name".to_string(), "alice".to_string())));
        assert!(env.contains(&("TF_VAR_api_token".to_string(), "tok".to_string())));
        assert!(env.contains(&("TF_VAR_realm".to_string(), "us1".to_string())));
        assert!(env.contains(&("KUBE_NAMESPACE".to_string(), "games".to_string())));
    }

    #[test]
    fn destroy_job_runs_destroy_command() {
        let builder = CloudJobBuilder::new(test_config());
        let job = builder.build(&player("alice"), &creds(), CloudJobAction::Destroy);
        assert_eq!(
            job.metadata.name.as_deref(),
            Some("app-player-alice-cloud-cleanup")
        );
        let pod = job.spec.unwrap().template.spec.unwrap();
        assert_eq!(
            pod.containers[0].command,
            Some(vec!["/entrypoint.destroy.sh".to_string()])
        );
    }
}
