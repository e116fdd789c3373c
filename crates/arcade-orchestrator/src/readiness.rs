//! Readiness poller.
//!
//! A single point-in-time read: the caller (a waiting page) re-polls.
//! Not finding the workload means "not ready yet", never an error.

use std::sync::Arc;

use tracing::{debug, warn};

use arcade_cluster::SharedCluster;
use arcade_core::{ArcadeConfig, Naming, PlayerId};

#[derive(Clone)]
pub struct ReadinessPoller {
    cluster: SharedCluster,
    config: Arc<ArcadeConfig>,
    naming: Naming,
}

impl ReadinessPoller {
    pub fn new(cluster: SharedCluster, config: Arc<ArcadeConfig>) -> Self {
        let naming = config.naming();
        Self {
            cluster,
            config,
            naming,
        }
    }

    /// True iff the first workload carrying the player's instance label
    /// reports at least one ready replica. Reserved players are always
    /// ready. Read failures count as not ready.
    pub async fn is_environment_ready(&self, player: &PlayerId) -> bool {
        if self.config.is_reserved(player) {
            return true;
        }

        let selector = self.naming.cabinet_selector(player);
        let workloads = match self.cluster.list_workloads(&selector).await {
            Ok(workloads) => workloads,
            Err(e) => {
                warn!(%player, error = %e, "readiness check failed, reporting not ready");
                return false;
            }
        };

        let ready = workloads
            .first()
            .and_then(|w| w.status.as_ref())
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0);

        debug!(%player, found = workloads.len(), ready, "readiness checked");
        ready > 0
    }
}
