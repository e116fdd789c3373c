//! Player environment provisioner: one gameplay cabinet per player.
//!
//! A cabinet is a single-replica Workload plus a ClusterIP Service whose
//! selector is the Workload's instance label. Both are created once at
//! registration and never mutated or deleted here.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment,
};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, EnvVarSource, HTTPGetAction, ObjectFieldSelector, PodSpec,
    PodTemplateSpec, Probe, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::{debug, error, info};

use arcade_cluster::SharedCluster;
use arcade_core::{ArcadeConfig, Naming, PlayerId};

use crate::error::OrchestratorResult;
use crate::resources;

/// Name of the cabinet container port.
const HTTP_PORT_NAME: &str = "http";

/// Variables computed per player; configured extras with these names are
/// dropped.
const COMPUTED_ENV: [&str; 3] = ["NODE_IP", "PLAYER_NAME", "ARCADE_HOST"];

/// Creates the Workload + Service pair for a player's cabinet.
#[derive(Clone)]
pub struct EnvironmentProvisioner {
    cluster: SharedCluster,
    config: Arc<ArcadeConfig>,
    naming: Naming,
}

impl EnvironmentProvisioner {
    pub fn new(cluster: SharedCluster, config: Arc<ArcadeConfig>) -> Self {
        let naming = config.naming();
        Self {
            cluster,
            config,
            naming,
        }
    }

    /// Ensure the player's cabinet exists.
    ///
    /// Reserved players are skipped without touching the control plane.
    /// An id too long for the configured prefix is rejected before any
    /// write. Any control-plane failure, including "already exists", is returned
    /// to the caller. A Workload created before a failed Service create is
    /// left in place.
    pub async fn ensure_environment(&self, player: &PlayerId) -> OrchestratorResult<()> {
        if self.config.is_reserved(player) {
            debug!(%player, "reserved player, environment provisioned out of band");
            return Ok(());
        }
        self.naming.check_player(player)?;

        let workload = self.build_workload(player);
        self.cluster.create_workload(&workload).await?;
        info!(%player, workload = %self.naming.workload_name(player), "cabinet workload created");

        let service = self.build_service(player);
        if let Err(e) = self.cluster.create_service(&service).await {
            error!(
                %player,
                service = %self.naming.service_name(player),
                error = %e,
                "cabinet service create failed after workload was created"
            );
            return Err(e.into());
        }
        info!(%player, service = %self.naming.service_name(player), "cabinet service created");

        Ok(())
    }

    /// Workload spec: one replica, surge 1 / unavailable 0, liveness probe
    /// on the health path.
    pub fn build_workload(&self, player: &PlayerId) -> Deployment {
        let cabinet = &self.config.cabinet;
        let labels = self.naming.cabinet_labels(player);

        let container = Container {
            name: "player".to_string(),
            image: Some(cabinet.image.clone()),
            image_pull_policy: Some(cabinet.image_pull_policy.clone()),
            resources: Some(resources::requirements(&cabinet.resources)),
            env: Some(self.build_env(player)),
            ports: Some(vec![ContainerPort {
                name: Some(HTTP_PORT_NAME.to_string()),
                container_port: i32::from(cabinet.container_port),
                ..ContainerPort::default()
            }]),
            liveness_probe: Some(Probe {
                http_get: Some(HTTPGetAction {
                    path: Some(cabinet.health_path.clone()),
                    port: IntOrString::String(HTTP_PORT_NAME.to_string()),
                    scheme: Some("HTTP".to_string()),
                    ..HTTPGetAction::default()
                }),
                success_threshold: Some(1),
                failure_threshold: Some(to_i32(cabinet.probe_failure_threshold)),
                period_seconds: Some(to_i32(cabinet.probe_period_secs)),
                timeout_seconds: Some(to_i32(cabinet.probe_timeout_secs)),
                ..Probe::default()
            }),
            ..Container::default()
        };

        Deployment {
            metadata: ObjectMeta {
                name: Some(self.naming.workload_name(player)),
                namespace: Some(self.config.namespace.clone()),
                labels: Some(labels.clone()),
                ..ObjectMeta::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                strategy: Some(DeploymentStrategy {
                    type_: Some("RollingUpdate".to_string()),
                    rolling_update: Some(RollingUpdateDeployment {
                        max_surge: Some(IntOrString::Int(1)),
                        max_unavailable: Some(IntOrString::Int(0)),
                    }),
                }),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..LabelSelector::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..ObjectMeta::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        ..PodSpec::default()
                    }),
                },
                ..DeploymentSpec::default()
            }),
            ..Deployment::default()
        }
    }

    /// Service spec: ClusterIP, no session affinity, service port to the
    /// container's named port.
    pub fn build_service(&self, player: &PlayerId) -> Service {
        let labels = self.naming.cabinet_labels(player);
        let selector: BTreeMap<String, String> = labels
            .iter()
            .filter(|(k, _)| k.as_str() == arcade_core::naming::LABEL_INSTANCE)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Service {
            metadata: ObjectMeta {
                name: Some(self.naming.service_name(player)),
                namespace: Some(self.config.namespace.clone()),
                labels: Some(labels),
                ..ObjectMeta::default()
            },
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                session_affinity: Some("None".to_string()),
                selector: Some(selector),
                ports: Some(vec![ServicePort {
                    name: Some(HTTP_PORT_NAME.to_string()),
                    protocol: Some("TCP".to_string()),
                    port: i32::from(self.config.cabinet.service_port),
                    target_port: Some(IntOrString::String(HTTP_PORT_NAME.to_string())),
                    ..ServicePort::default()
                }]),
                ..ServiceSpec::default()
            }),
            ..Service::default()
        }
    }

    fn build_env(&self, player: &PlayerId) -> Vec<EnvVar> {
        let mut env = vec![EnvVar {
            name: "NODE_IP".to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: "status.hostIP".to_string(),
                    ..ObjectFieldSelector::default()
                }),
                ..EnvVarSource::default()
            }),
            ..EnvVar::default()
        }];

        env.extend(
            self.config
                .cabinet
                .env
                .iter()
                .filter(|(name, _)| !COMPUTED_ENV.contains(&name.as_str()))
                .map(|(name, value)| plain_var(name, value)),
        );

        env.push(plain_var("PLAYER_NAME", player.as_str()));
        if let Some(host) = &self.config.cabinet.ingress_host {
            env.push(plain_var("ARCADE_HOST", host));
        }
        env
    }
}

fn plain_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..EnvVar::default()
    }
}

fn to_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}
