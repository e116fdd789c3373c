//! Reclaim mode: one exclusive batch run.
//!
//! Runs must not overlap; schedule them one at a time. The process exits
//! non-zero when any secret other than a reserved player's was retained so
//! the scheduler surfaces it.

use std::sync::Arc;

use arcade_cluster::SharedCluster;
use arcade_core::{ArcadeConfig, CloudCredentials};
use arcade_orchestrator::{OrphanReclaimer, ReclaimReport, RetainReason};

use crate::ReportFormat;

pub async fn run(
    cluster: SharedCluster,
    config: Arc<ArcadeConfig>,
    credentials: CloudCredentials,
    format: ReportFormat,
) -> anyhow::Result<()> {
    let report = OrphanReclaimer::new(cluster, config, credentials)
        .run()
        .await?;

    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        ReportFormat::Text => print_text(&report),
    }

    if !report.is_clean() {
        let unexpected = report
            .retained
            .iter()
            .filter(|r| r.reason != RetainReason::Reserved)
            .count();
        anyhow::bail!(
            "{unexpected} of {} state secrets retained",
            report.scanned
        );
    }
    Ok(())
}

fn print_text(report: &ReclaimReport) {
    println!("scanned:  {}", report.scanned);
    println!("deleted:  {}", report.deleted.len());
    for secret in &report.deleted {
        println!("  - {secret}");
    }
    println!("retained: {}", report.retained.len());
    for kept in &report.retained {
        println!("  - {} ({:?})", kept.secret, kept.reason);
    }
}
