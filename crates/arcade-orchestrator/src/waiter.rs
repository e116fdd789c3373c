//! Job completion waiter.
//!
//! Bounded polling for a run-to-completion Job. Only an observed success
//! returns `true`; a timeout returns `false` and must never be read as
//! success. The call occupies its task for up to `timeout`, so drive it
//! from a background task rather than a request handler.

use std::time::Duration;

use k8s_openapi::api::batch::v1::Job;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use arcade_cluster::SharedCluster;

/// Floor for the poll interval so a zero interval cannot spin.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Clone)]
pub struct JobWaiter {
    cluster: SharedCluster,
}

impl JobWaiter {
    pub fn new(cluster: SharedCluster) -> Self {
        Self { cluster }
    }

    /// Poll `job_name` every `interval` until it succeeds or `timeout`
    /// elapses.
    ///
    /// A missing Job or a failed read is treated as "not complete yet".
    pub async fn wait_for_job(&self, job_name: &str, timeout: Duration, interval: Duration) -> bool {
        let interval = interval.max(MIN_INTERVAL);
        let started = Instant::now();

        loop {
            match self.cluster.get_job(job_name).await {
                Ok(Some(job)) if job_succeeded(&job) => {
                    info!(job = %job_name, elapsed_ms = started.elapsed().as_millis() as u64, "job succeeded");
                    return true;
                }
                Ok(Some(_)) => debug!(job = %job_name, "job not complete yet"),
                Ok(None) => debug!(job = %job_name, "job not found"),
                Err(e) => warn!(job = %job_name, error = %e, "job status read failed"),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                warn!(job = %job_name, timeout_secs = timeout.as_secs(), "timed out waiting for job");
                return false;
            }
            tokio::time::sleep(interval.min(timeout - elapsed)).await;
        }
    }
}

/// A Job has succeeded once it reports a successful pod or a `Complete`
/// condition.
pub fn job_succeeded(job: &Job) -> bool {
    let Some(status) = job.status.as_ref() else {
        return false;
    };
    if status.succeeded.is_some_and(|n| n > 0) {
        return true;
    }
    status
        .conditions
        .iter()
        .flatten()
        .any(|c| c.type_ == "Complete" && c.status == "True")
}
