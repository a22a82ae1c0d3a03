use crate::error::Error;
use crate::national::NationalSnapshot;
use crate::service::PredictionService;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One request line from the client.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Predict { user_id: String, survey: Value },
    History { user_id: String },
    ClearHistory { user_id: String },
    National {
        #[serde(default)]
        latest_per_user: bool,
    },
}

/// One response line. `status` follows HTTP semantics so a web front can pass it through.
#[derive(Debug, Serialize, PartialEq)]
pub struct Response {
    pub status: u16,
    #[serde(flatten)]
    pub body: Value,
}

impl Response {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn message(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "message": message.into() }),
        }
    }

    fn from_error(e: &Error) -> Self {
        let status = match e {
            Error::MalformedPayload(_) => 400,
            Error::ModelUnavailable(_) => 503,
            _ => 500,
        };
        if status == 500 {
            error!("Request failed: {}", e);
        }
        Self {
            status,
            body: json!({ "error": e.to_string() }),
        }
    }
}

pub async fn handle_line(service: &PredictionService, line: &str) -> Response {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => handle_request(service, request).await,
        Err(e) => {
            warn!("Rejected request line: {}", e);
            Response::message(400, format!("Invalid request: {}", e))
        }
    }
}

pub async fn handle_request(service: &PredictionService, request: Request) -> Response {
    let result = match request {
        Request::Predict { user_id, survey } => {
            info!("Received prediction request for user {}", user_id);
            service
                .predict_for_user(&user_id, &survey)
                .await
                .and_then(|result| Ok(serde_json::to_value(result)?))
        }
        Request::History { user_id } => service
            .history(&user_id)
            .await
            .and_then(|history| Ok(serde_json::to_value(history)?)),
        Request::ClearHistory { user_id } => service.clear_history(&user_id).await.map(|removed| {
            json!({ "message": "Prediction history cleared.", "removed": removed })
        }),
        Request::National { latest_per_user } => {
            let snapshot = if latest_per_user {
                service.national_latest_per_user().await
            } else {
                service.national().await
            };
            match snapshot {
                Ok(NationalSnapshot::NoPredictions) => {
                    return Response::message(404, "No predictions yet");
                }
                Ok(NationalSnapshot::Estimate(estimate)) => Ok(json!({
                    "national_winner": estimate.winner,
                    "percentages": estimate.percentages,
                    "sample_size": estimate.sample_size,
                    "generated_at": estimate.generated_at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                })),
                Err(e) => Err(e),
            }
        }
    };

    match result {
        Ok(body) => Response::ok(body),
        Err(e) => Response::from_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::service::tests::service;
    use crate::service::Artifacts;
    use std::sync::Arc;

    #[tokio::test]
    async fn predict_then_national() {
        let service = service();
        let response = handle_line(
            &service,
            r#"{"op": "predict", "user_id": "7", "survey": {"climate_priority": "Yes"}}"#,
        )
        .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["winner"], "lab");
        assert_eq!(response.body["top_predictions"].as_array().unwrap().len(), 3);

        let response = handle_line(&service, r#"{"op": "national"}"#).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["national_winner"], "lab");
        assert_eq!(response.body["sample_size"], 1);
        assert_eq!(response.body["percentages"]["lab"], 100.0);
    }

    #[tokio::test]
    async fn national_without_predictions_is_not_found() {
        let response = handle_line(&service(), r#"{"op": "national"}"#).await;
        assert_eq!(response, Response::message(404, "No predictions yet"));
    }

    #[tokio::test]
    async fn malformed_survey_is_bad_request() {
        let response = handle_line(
            &service(),
            r#"{"op": "predict", "user_id": "7", "survey": ["yes"]}"#,
        )
        .await;
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn unparseable_line_is_bad_request() {
        let response = handle_line(&service(), "predict please").await;
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn unavailable_model_is_service_unavailable() {
        let artifacts = Artifacts::load("/nonexistent/model.json", "/nonexistent/encoder.json");
        let service = PredictionService::new(artifacts, Arc::new(MemoryStore::new()), 50);
        let response = handle_line(
            &service,
            r#"{"op": "predict", "user_id": "7", "survey": {}}"#,
        )
        .await;
        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn history_and_clear() {
        let service = service();
        handle_line(&service, r#"{"op": "predict", "user_id": "9", "survey": {}}"#).await;

        let response = handle_line(&service, r#"{"op": "history", "user_id": "9"}"#).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["latest"]["winner"], "lab");
        assert_eq!(response.body["history"].as_array().unwrap().len(), 1);

        let response = handle_line(&service, r#"{"op": "clear_history", "user_id": "9"}"#).await;
        assert_eq!(response.body["removed"], 1);

        let response = handle_line(&service, r#"{"op": "history", "user_id": "9"}"#).await;
        assert_eq!(response.body["latest"], Value::Null);
    }
}
