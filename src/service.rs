use crate::db::PredictionStore;
use crate::error::{ArtifactError, Error, Result};
use crate::features::{CategoricalEncoder, FeatureEncoder, RawSurveyResponse, UNKNOWN};
use crate::inference::{Classifier, InferenceEngine, TreeEnsemble};
use crate::models::{PredictionRecord, PredictionResult};
use crate::national::{self, NationalSnapshot};
use log::{error, info};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

/// The offline-trained encoder and classifier, checked against each other.
pub struct Artifacts {
    pub encoder: FeatureEncoder,
    pub engine: InferenceEngine,
}

impl Artifacts {
    pub fn load(
        model_path: impl AsRef<Path>,
        encoder_path: impl AsRef<Path>,
    ) -> std::result::Result<Self, ArtifactError> {
        let classifier = TreeEnsemble::from_path(model_path)?;
        info!(
            "Loaded classifier with {} trees over {} columns",
            classifier.tree_count(),
            classifier.feature_names().len()
        );
        let categorical = CategoricalEncoder::from_path(encoder_path)?;
        info!(
            "Loaded categorical encoder with {} output columns",
            categorical.feature_names_out().len()
        );
        Self::from_parts(Arc::new(categorical), Arc::new(classifier))
    }

    pub fn from_parts(
        categorical: Arc<CategoricalEncoder>,
        classifier: Arc<dyn Classifier>,
    ) -> std::result::Result<Self, ArtifactError> {
        let encoder = FeatureEncoder::new(categorical, classifier.feature_names().to_vec())?;
        let engine = InferenceEngine::new(classifier)?;
        Ok(Self { encoder, engine })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserHistory {
    pub latest: Option<PredictionRecord>,
    pub history: Vec<PredictionRecord>,
}

/// Runs predictions for users and reads the national picture back out of the store.
pub struct PredictionService {
    encoder: Option<FeatureEncoder>,
    engine: InferenceEngine,
    store: Arc<dyn PredictionStore>,
    history_limit: u32,
}

impl PredictionService {
    /// A failed artifact load leaves the service up; predictions then report
    /// `ModelUnavailable` while history and national reads keep working.
    pub fn new(
        artifacts: std::result::Result<Artifacts, ArtifactError>,
        store: Arc<dyn PredictionStore>,
        history_limit: u32,
    ) -> Self {
        let (encoder, engine) = match artifacts {
            Ok(artifacts) => (Some(artifacts.encoder), artifacts.engine),
            Err(e) => {
                error!("Failed to load model artifacts: {}", e);
                (None, InferenceEngine::unavailable(e.to_string()))
            }
        };
        Self {
            encoder,
            engine,
            store,
            history_limit,
        }
    }

    pub fn is_model_available(&self) -> bool {
        self.encoder.is_some() && self.engine.is_available()
    }

    pub async fn predict_for_user(&self, user_id: &str, payload: &Value) -> Result<PredictionResult> {
        let encoder = match &self.encoder {
            Some(encoder) => encoder,
            None => {
                return Err(Error::ModelUnavailable(
                    "Model is not loaded on server. Please try again later.".to_string(),
                ));
            }
        };

        let raw = RawSurveyResponse::from_json(payload)?;
        let vector = encoder.encode(&raw);
        let result = self.engine.predict(&vector)?;

        let record = PredictionRecord::new(user_id.to_string(), &result, region_of(&raw));
        self.store.append(&record).await?;
        info!(
            "Stored prediction {} for user {}: {} ({:.2}%)",
            record.id, user_id, result.winner, result.confidence
        );

        Ok(result)
    }

    pub async fn history(&self, user_id: &str) -> Result<UserHistory> {
        let history = self.store.history_for_user(user_id, self.history_limit).await?;
        Ok(UserHistory {
            latest: history.first().cloned(),
            history,
        })
    }

    pub async fn clear_history(&self, user_id: &str) -> Result<u64> {
        let removed = self.store.clear_user(user_id).await?;
        info!("Cleared {} prediction(s) for user {}", removed, user_id);
        Ok(removed)
    }

    pub async fn national(&self) -> Result<NationalSnapshot> {
        let records = self.store.all().await?;
        Ok(national::aggregate(&records))
    }

    /// Same as [`national`](Self::national) but each user counts once, by their newest record.
    pub async fn national_latest_per_user(&self) -> Result<NationalSnapshot> {
        let records = self.store.all().await?;
        Ok(national::aggregate(&national::latest_per_user(&records)))
    }
}

fn region_of(raw: &RawSurveyResponse) -> Option<String> {
    let survey = raw.normalize();
    ["constituency_leaning", "region"]
        .iter()
        .filter_map(|key| survey.answer(key))
        .map(|answer| answer.canonical())
        .find(|region| !region.is_empty() && region != UNKNOWN)
}
