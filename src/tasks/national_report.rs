use crate::error::Result;
use crate::national::NationalSnapshot;
use crate::service::PredictionService;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::time::interval;

pub async fn report_national_estimate_task(service: Arc<PredictionService>, every_seconds: u64) {
    info!("Starting background task to report the national estimate every {}s...", every_seconds);
    let mut interval = interval(StdDuration::from_secs(every_seconds.max(1)));

    loop {
        interval.tick().await; // Wait for the next interval tick

        match report_once(&service).await {
            Ok(Some(summary)) => info!("{}", summary),
            Ok(None) => debug!("No predictions to report yet"),
            Err(e) => error!("Failed to compute national estimate: {}", e),
        }
    }
}

/// One summary line for the current estimate, `None` while nothing is stored.
pub async fn report_once(service: &PredictionService) -> Result<Option<String>> {
    let estimate = match service.national().await? {
        NationalSnapshot::Estimate(estimate) => estimate,
        NationalSnapshot::NoPredictions => return Ok(None),
    };

    let shares: Vec<String> = estimate
        .percentages
        .iter()
        .map(|(party, share)| format!("{} {:.1}%", party, share))
        .collect();
    Ok(Some(format!(
        "National estimate over {} prediction(s): {} leads ({})",
        estimate.sample_size,
        estimate.winner,
        shares.join(", ")
    )))
}
