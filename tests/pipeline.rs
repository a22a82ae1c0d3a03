use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use trusty_forecast::db::{Database, MemoryStore};
use trusty_forecast::{Artifacts, Error, NationalSnapshot, Party, PredictionService};

fn model_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models")
}

fn load() -> Artifacts {
    let dir = model_dir();
    Artifacts::load(dir.join("classifier.json"), dir.join("encoder.json")).unwrap()
}

#[test]
fn shipped_artifacts_line_up() {
    let artifacts = load();
    assert!(artifacts.engine.is_available());
    assert_eq!(
        artifacts.engine.feature_names().unwrap(),
        artifacts.encoder.columns()
    );
}

#[test]
fn scottish_respondent_predicts_snp() {
    let artifacts = load();
    let vector = artifacts
        .encoder
        .encode_json(&json!({
            "constituency_leaning": "Scotland",
            "vote_local": "SNP",
            "education_level": "bachelors degree",
        }))
        .unwrap();
    assert_eq!(vector.get("is_snp_region"), Some(1.0));
    assert_eq!(vector.get("constituency_leaning_scotland"), Some(1.0));

    let result = artifacts.engine.predict(&vector).unwrap();
    assert_eq!(result.winner, Party::Snp);
    let total: f64 = result.probabilities.values().sum();
    assert!((99.5..=100.5).contains(&total));
}

#[test]
fn full_labour_survey_predicts_lab() {
    let artifacts = load();
    let vector = artifacts
        .encoder
        .encode_json(&json!({
            "age_bracket": "18-24",
            "education_level": "bachelors degree",
            "household_income": "£20,000–£40,000",
            "socioeconomic_class": "working_class",
            "housing_status": "rent",
            "constituency_leaning": "midlands",
            "vote_national": "remain",
            "vote_local": "labour",
            "satisfaction_national_government": "dissatisfied",
            "importance_economy": "high",
            "importance_social_issues": "very important",
            "support_welfare_spending": "yes",
            "tax_on_wealthy": "yes",
            "trust_mainstream_media": "low",
            "concern_political_corruption": "somewhat concerned",
            "climate_priority": "yes",
            "immigration_policy_stance": "liberal",
            "trust_public_institutions": "medium",
        }))
        .unwrap();
    let result = artifacts.engine.predict(&vector).unwrap();
    assert_eq!(result.winner, Party::Lab);
    assert_eq!(result.top_predictions[0].confidence, result.confidence);
}

#[tokio::test]
async fn predictions_flow_into_national_estimate() {
    let database = Database::new("sqlite::memory:").await.unwrap();
    let service = PredictionService::new(Ok(load()), Arc::new(database), 50);

    assert_eq!(service.national().await.unwrap(), NationalSnapshot::NoPredictions);

    for user in ["1", "2", "3"] {
        service
            .predict_for_user(user, &json!({"constituency_leaning": "scotland", "vote_local": "snp"}))
            .await
            .unwrap();
    }
    service
        .predict_for_user("4", &json!({"vote_local": "labour"}))
        .await
        .unwrap();

    let snapshot = service.national().await.unwrap();
    let estimate = snapshot.estimate().unwrap();
    assert_eq!(estimate.sample_size, 4);
    assert_eq!(estimate.winner, Party::Snp);
    assert_eq!(estimate.percentages[&Party::Snp], 75.0);
    assert_eq!(estimate.percentages[&Party::Lab], 25.0);

    let history = service.history("1").await.unwrap();
    assert_eq!(history.latest.unwrap().region.as_deref(), Some("scotland"));
}

#[tokio::test]
async fn corrupt_model_file_leaves_service_unavailable() {
    let mut model = tempfile::NamedTempFile::new().unwrap();
    write!(model, "{{\"feature_names\": [").unwrap();

    let artifacts = Artifacts::load(model.path(), model_dir().join("encoder.json"));
    assert!(artifacts.is_err());

    let service = PredictionService::new(artifacts, Arc::new(MemoryStore::new()), 50);
    let err = service
        .predict_for_user("1", &json!({"vote_local": "green"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ModelUnavailable(_)));
    assert!(err.is_retryable());
}
