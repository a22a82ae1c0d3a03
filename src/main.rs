use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use trusty_forecast::config::Config;
use trusty_forecast::db::Database;
use trusty_forecast::handlers;
use trusty_forecast::service::{Artifacts, PredictionService};
use trusty_forecast::tasks;

#[tokio::main]
async fn main() {
    // Initialize logging
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    // Initialize database
    let database = match Database::new(&config.database_url).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return;
        }
    };

    // A missing model keeps the service up; predictions answer 503 until redeploy
    let artifacts = Artifacts::load(&config.model_path, &config.encoder_path);
    let service = Arc::new(PredictionService::new(artifacts, database, config.history_limit));
    if service.is_model_available() {
        info!("Model artifacts loaded from {} and {}", config.model_path, config.encoder_path);
    } else {
        warn!("Serving without a model; prediction requests will be rejected");
    }

    if config.report_interval_seconds > 0 {
        let service_clone = Arc::clone(&service);
        let every = config.report_interval_seconds;
        tokio::spawn(async move {
            tasks::national_report::report_national_estimate_task(service_clone, every).await;
        });
    }

    info!("Reading requests from stdin, one JSON object per line");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read request: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = handlers::handle_line(&service, &line).await;
        let mut out = match serde_json::to_string(&response) {
            Ok(out) => out,
            Err(e) => {
                error!("Failed to serialize response: {}", e);
                continue;
            }
        };
        out.push('\n');
        if let Err(e) = stdout.write_all(out.as_bytes()).await {
            error!("Failed to write response: {}", e);
            break;
        }
        if let Err(e) = stdout.flush().await {
            error!("Failed to flush response: {}", e);
            break;
        }
    }

    info!("Input closed, shutting down");
}
