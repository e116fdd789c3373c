//! Orphan reclaimer: destroys cloud state whose cleanup never provably ran.
//!
//! Runs as a single batch. Pass one submits a destroy Job for every cloud
//! state secret; pass two waits on all submitted Jobs concurrently; pass
//! three deletes the secrets whose destroy Job was observed to succeed.
//! A secret is never deleted on a timeout. One player's failure never stops
//! the others, and retained secrets are picked up again by the next run.
//!
//! Reserved players (shared development identities) are never destroyed:
//! their secrets are reported as retained and left in place.
//!
//! A create conflict on the destroy Job is taken as evidence that a destroy
//! already ran for that player. With `verify_conflicting_jobs` the existing
//! Job goes through the same completion wait instead.

use std::collections::BTreeMap;
use std::sync::Arc;

use kube::ResourceExt;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use arcade_cluster::SharedCluster;
use arcade_core::{ArcadeConfig, CloudCredentials, CloudJobAction, Naming, PlayerId};

use crate::cloud::CloudJobBuilder;
use crate::error::OrchestratorResult;
use crate::waiter::JobWaiter;

/// Why a state secret was kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum RetainReason {
    /// The player is reserved; its cloud state is not reclaimed.
    Reserved,
    /// The secret name does not yield a valid player id.
    InvalidName,
    /// Submitting the destroy Job failed with something other than a
    /// conflict.
    JobCreateFailed(String),
    /// The destroy Job did not report success within the timeout.
    JobTimedOut,
    /// The waiter task for the destroy Job did not finish.
    WaiterFailed(String),
    /// The destroy succeeded but deleting the secret failed.
    SecretDeleteFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetainedSecret {
    pub secret: String,
    pub player: Option<PlayerId>,
    #[serde(flatten)]
    pub reason: RetainReason,
}

/// Outcome of one reclamation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReclaimReport {
    /// State secrets found.
    pub scanned: usize,
    /// Secrets deleted, by name.
    pub deleted: Vec<String>,
    pub retained: Vec<RetainedSecret>,
}

impl ReclaimReport {
    /// True when nothing was retained except reserved players' state.
    pub fn is_clean(&self) -> bool {
        self.retained
            .iter()
            .all(|r| r.reason == RetainReason::Reserved)
    }

    fn retain(&mut self, secret: String, player: Option<PlayerId>, reason: RetainReason) {
        self.retained.push(RetainedSecret {
            secret,
            player,
            reason,
        });
    }
}

/// A secret whose destroy Job is being waited on.
struct PendingDestroy {
    secret: String,
    player: PlayerId,
    job: String,
}

pub struct OrphanReclaimer {
    cluster: SharedCluster,
    config: Arc<ArcadeConfig>,
    naming: Naming,
    jobs: CloudJobBuilder,
    waiter: JobWaiter,
    credentials: CloudCredentials,
}

impl OrphanReclaimer {
    pub fn new(
        cluster: SharedCluster,
        config: Arc<ArcadeConfig>,
        credentials: CloudCredentials,
    ) -> Self {
        Self {
            naming: config.naming(),
            jobs: CloudJobBuilder::new(config.clone()),
            waiter: JobWaiter::new(cluster.clone()),
            cluster,
            config,
            credentials,
        }
    }

    /// Run one reclamation pass. Only listing the secrets is fatal; every
    /// per-player failure is recorded in the report.
    pub async fn run(&self) -> OrchestratorResult<ReclaimReport> {
        let secrets = self
            .cluster
            .list_secrets(&self.naming.state_secret_selector())
            .await?;

        let mut report = ReclaimReport {
            scanned: secrets.len(),
            ..ReclaimReport::default()
        };
        info!(
            namespace = %self.cluster.namespace(),
            count = secrets.len(),
            "reclaiming orphaned cloud state"
        );

        let mut deletable: Vec<(String, PlayerId)> = Vec::new();
        let mut pending: Vec<PendingDestroy> = Vec::new();

        // ── Pass 1: submit destroy jobs ─────────────────────────────
        for secret in secrets {
            let secret_name = secret.name_any();
            let Some(player) = self.naming.player_from_state_secret(&secret_name) else {
                warn!(secret = %secret_name, "cannot derive player from state secret, skipping");
                report.retain(secret_name, None, RetainReason::InvalidName);
                continue;
            };
            if self.config.is_reserved(&player) {
                info!(%player, secret = %secret_name, "reserved player, keeping state secret");
                report.retain(secret_name, Some(player), RetainReason::Reserved);
                continue;
            }

            let job = self
                .jobs
                .build(&player, &self.credentials, CloudJobAction::Destroy);
            let job_name = job.name_any();

            match self.cluster.create_job(&job).await {
                Ok(()) => {
                    info!(%player, job = %job_name, "destroy job submitted");
                    pending.push(PendingDestroy {
                        secret: secret_name,
                        player,
                        job: job_name,
                    });
                }
                Err(e) if e.is_conflict() && self.config.reclaim.verify_conflicting_jobs => {
                    info!(%player, job = %job_name, "destroy job already exists, waiting on it");
                    pending.push(PendingDestroy {
                        secret: secret_name,
                        player,
                        job: job_name,
                    });
                }
                Err(e) if e.is_conflict() => {
                    info!(%player, job = %job_name, "destroy job already exists, treating state as destroyed");
                    deletable.push((secret_name, player));
                }
                Err(e) => {
                    warn!(%player, error = %e, "failed creating destroy job, not removing state secret");
                    report.retain(
                        secret_name,
                        Some(player),
                        RetainReason::JobCreateFailed(e.to_string()),
                    );
                }
            }
        }

        // ── Pass 2: wait for every submitted job ────────────────────
        let timeout = self.config.reclaim.job_timeout();
        let interval = self.config.reclaim.poll_interval();
        let mut outstanding: BTreeMap<String, PlayerId> = BTreeMap::new();
        let mut waits = JoinSet::new();

        for destroy in pending {
            outstanding.insert(destroy.secret.clone(), destroy.player.clone());
            let waiter = self.waiter.clone();
            waits.spawn(async move {
                let done = waiter.wait_for_job(&destroy.job, timeout, interval).await;
                (destroy, done)
            });
        }

        while let Some(joined) = waits.join_next().await {
            match joined {
                Ok((destroy, true)) => {
                    outstanding.remove(&destroy.secret);
                    deletable.push((destroy.secret, destroy.player));
                }
                Ok((destroy, false)) => {
                    outstanding.remove(&destroy.secret);
                    warn!(
                        player = %destroy.player,
                        job = %destroy.job,
                        "destroy job did not complete, retaining state secret"
                    );
                    report.retain(destroy.secret, Some(destroy.player), RetainReason::JobTimedOut);
                }
                Err(e) => error!(error = %e, "destroy job waiter task failed"),
            }
        }

        for (secret, player) in outstanding {
            report.retain(
                secret,
                Some(player),
                RetainReason::WaiterFailed("waiter task did not finish".to_string()),
            );
        }

        // ── Pass 3: delete state for proven destroys ────────────────
        deletable.sort_by(|a, b| a.0.cmp(&b.0));
        for (secret, player) in deletable {
            match self.cluster.delete_secret(&secret).await {
                Ok(existed) => {
                    info!(%player, %secret, existed, "state secret removed");
                    report.deleted.push(secret);
                }
                Err(e) => {
                    warn!(%player, %secret, error = %e, "failed deleting state secret");
                    report.retain(
                        secret,
                        Some(player),
                        RetainReason::SecretDeleteFailed(e.to_string()),
                    );
                }
            }
        }

        report.retained.sort_by(|a, b| a.secret.cmp(&b.secret));
        info!(
            scanned = report.scanned,
            deleted = report.deleted.len(),
            retained = report.retained.len(),
            "reclamation finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{cluster, player, test_config};
    use arcade_cluster::{ClusterClient, CreateFailure, InMemoryCluster, ResourceKind};
    use k8s_openapi::api::core::v1::Secret;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    async fn seed_state(mem: &InMemoryCluster, players: &[&str]) {
        let naming = test_config().naming();
        for p in players {
            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(naming.state_secret_name(&player(p))),
                    labels: Some(naming.state_secret_labels()),
                    ..ObjectMeta::default()
                },
                ..Secret::default()
            };
            mem.create_secret(&secret).await.unwrap();
        }
    }

    fn reclaimer(shared: SharedCluster, config: Arc<ArcadeConfig>) -> OrphanReclaimer {
        OrphanReclaimer::new(shared, config, CloudCredentials::new("tok", "us1"))
    }

    #[tokio::test(start_paused = true)]
    async fn destroys_then_deletes_state() {
        let (mem, shared) = cluster();
        mem.complete_jobs_on_create(true).await;
        seed_state(&mem, &["alice", "bob"]).await;

        let report = reclaimer(shared, test_config()).run().await.unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(
            report.deleted,
            vec!["tfstate-default-alice", "tfstate-default-bob"]
        );
        assert!(report.is_clean());
        assert!(mem.secret_names().await.is_empty());
        assert_eq!(
            mem.job_names().await,
            vec!["app-player-alice-cloud-cleanup", "app-player-bob-cloud-cleanup"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn second_run_processes_nothing() {
        let (mem, shared) = cluster();
        mem.complete_jobs_on_create(true).await;
        seed_state(&mem, &["alice", "bob"]).await;
        let reclaimer = reclaimer(shared, test_config());

        reclaimer.run().await.unwrap();
        let jobs_after_first = mem.job_names().await;
        let second = reclaimer.run().await.unwrap();

        assert_eq!(second, ReclaimReport::default());
        assert_eq!(mem.job_names().await, jobs_after_first);
    }

    #[tokio::test(start_paused = true)]
    async fn create_failure_is_isolated() {
        let (mem, shared) = cluster();
        mem.complete_jobs_on_create(true).await;
        seed_state(&mem, &["alice", "bob", "carol"]).await;
        mem.fail_create(
            ResourceKind::Job,
            "app-player-bob-cloud-cleanup",
            CreateFailure::Rejected(500),
        )
        .await;

        let report = reclaimer(shared, test_config()).run().await.unwrap();

        assert_eq!(
            report.deleted,
            vec!["tfstate-default-alice", "tfstate-default-carol"]
        );
        assert_eq!(report.retained.len(), 1);
        assert_eq!(report.retained[0].player, Some(player("bob")));
        assert!(matches!(
            report.retained[0].reason,
            RetainReason::JobCreateFailed(_)
        ));
        assert_eq!(mem.secret_names().await, vec!["tfstate-default-bob"]);
        assert_eq!(
            mem.job_names().await,
            vec!["app-player-alice-cloud-cleanup", "app-player-carol-cloud-cleanup"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn conflict_counts_as_prior_destroy() {
        let (mem, shared) = cluster();
        seed_state(&mem, &["alice"]).await;
        mem.fail_create(
            ResourceKind::Job,
            "app-player-alice-cloud-cleanup",
            CreateFailure::Conflict,
        )
        .await;

        let report = reclaimer(shared, test_config()).run().await.unwrap();

        assert_eq!(report.deleted, vec!["tfstate-default-alice"]);
        assert!(mem.secret_names().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn verified_conflict_waits_on_existing_job() {
        let (mem, shared) = cluster();
        seed_state(&mem, &["alice"]).await;
        let mut config = (*test_config()).clone();
        config.reclaim.verify_conflicting_jobs = true;
        config.reclaim.job_timeout_secs = 30;

        // A stuck destroy job from an earlier run.
        let stuck = CloudJobBuilder::new(Arc::new(config.clone())).build(
            &player("alice"),
            &CloudCredentials::default(),
            CloudJobAction::Destroy,
        );
        mem.create_job(&stuck).await.unwrap();

        let report = reclaimer(shared, Arc::new(config)).run().await.unwrap();

        assert!(report.deleted.is_empty());
        assert_eq!(report.retained[0].reason, RetainReason::JobTimedOut);
        assert_eq!(mem.secret_names().await, vec!["tfstate-default-alice"]);
    }

    #[tokio::test(start_paused = true)]
    async fn verified_conflict_deletes_state_once_existing_job_succeeds() {
        let (mem, shared) = cluster();
        seed_state(&mem, &["alice"]).await;
        let mut config = (*test_config()).clone();
        config.reclaim.verify_conflicting_jobs = true;
        config.reclaim.job_timeout_secs = 60;

        let earlier = CloudJobBuilder::new(Arc::new(config.clone())).build(
            &player("alice"),
            &CloudCredentials::default(),
            CloudJobAction::Destroy,
        );
        mem.create_job(&earlier).await.unwrap();

        let completer = mem.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(12)).await;
            completer.complete_job("app-player-alice-cloud-cleanup").await;
        });

        let report = reclaimer(shared, Arc::new(config)).run().await.unwrap();

        assert_eq!(report.deleted, vec!["tfstate-default-alice"]);
        assert!(report.is_clean());
        assert!(mem.secret_names().await.is_empty());
        assert_eq!(mem.job_names().await, vec!["app-player-alice-cloud-cleanup"]);
    }

    #[tokio::test(start_paused = true)]
    async fn reserved_players_keep_their_state() {
        let (mem, shared) = cluster();
        mem.complete_jobs_on_create(true).await;
        seed_state(&mem, &["alice", "devplayer"]).await;

        let report = reclaimer(shared, test_config()).run().await.unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.deleted, vec!["tfstate-default-alice"]);
        assert_eq!(report.retained.len(), 1);
        assert_eq!(report.retained[0].player, Some(player("devplayer")));
        assert_eq!(report.retained[0].reason, RetainReason::Reserved);
        assert!(report.is_clean());
        assert_eq!(mem.secret_names().await, vec!["tfstate-default-devplayer"]);
        assert_eq!(mem.job_names().await, vec!["app-player-alice-cloud-cleanup"]);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_jobs_keep_their_state() {
        let (mem, shared) = cluster();
        seed_state(&mem, &["alice", "bob"]).await;
        let mut config = (*test_config()).clone();
        config.reclaim.job_timeout_secs = 60;

        let completer = mem.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(12)).await;
            completer.complete_job("app-player-alice-cloud-cleanup").await;
        });

        let started = tokio::time::Instant::now();
        let report = reclaimer(shared, Arc::new(config)).run().await.unwrap();

        assert_eq!(report.deleted, vec!["tfstate-default-alice"]);
        assert_eq!(report.retained.len(), 1);
        assert_eq!(report.retained[0].player, Some(player("bob")));
        assert_eq!(report.retained[0].reason, RetainReason::JobTimedOut);
        assert_eq!(mem.secret_names().await, vec!["tfstate-default-bob"]);
        // Waits overlap, so the run is bounded by one timeout, not two.
        assert!(started.elapsed() < std::time::Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn unparseable_secret_names_are_skipped() {
        let (mem, shared) = cluster();
        let naming = test_config().naming();
        let odd = Secret {
            metadata: ObjectMeta {
                name: Some("tfstate-default-Not_Valid".to_string()),
                labels: Some(naming.state_secret_labels()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        };
        mem.create_secret(&odd).await.unwrap();

        let report = reclaimer(shared, test_config()).run().await.unwrap();

        assert_eq!(report.retained[0].reason, RetainReason::InvalidName);
        assert!(mem.job_names().await.is_empty());
        assert_eq!(mem.secret_names().await, vec!["tfstate-default-Not_Valid"]);
    }

    #[tokio::test]
    async fn unrelated_secrets_are_ignored() {
        let (mem, shared) = cluster();
        let other = Secret {
            metadata: ObjectMeta {
                name: Some("tfstate-default-alice".to_string()),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        };
        mem.create_secret(&other).await.unwrap();

        let report = reclaimer(shared, test_config()).run().await.unwrap();
        assert_eq!(report.scanned, 0);
        assert_eq!(mem.secret_names().await.len(), 1);
    }
}
