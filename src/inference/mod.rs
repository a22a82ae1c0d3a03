pub mod trees;

pub use trees::TreeEnsemble;

use crate::error::{ArtifactError, Error, Result};
use crate::features::EncodedVector;
use crate::models::{round_to, Party, PartyConfidence, PredictionResult};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

const TOP_K: usize = 3;

/// A pretrained probabilistic classifier over the encoded survey row.
///
/// Implementations are read-only after construction and shared across tasks.
pub trait Classifier: Send + Sync {
    /// Column names the model was trained on, in input order.
    fn feature_names(&self) -> &[String];

    /// Numeric class ids, aligned with the output of `predict_proba`.
    fn classes(&self) -> &[usize];

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>>;
}

enum ModelSlot {
    Ready(Arc<dyn Classifier>),
    Unavailable(String),
}

pub struct InferenceEngine {
    model: ModelSlot,
}

impl InferenceEngine {
    /// Checks that every class id names a party before accepting the model.
    pub fn new(classifier: Arc<dyn Classifier>) -> std::result::Result<Self, ArtifactError> {
        let mut seen = HashSet::new();
        for class in classifier.classes() {
            if Party::from_class_id(*class).is_none() {
                return Err(ArtifactError::Invalid(format!(
                    "classifier class {} has no party mapping",
                    class
                )));
            }
            if !seen.insert(*class) {
                return Err(ArtifactError::Invalid(format!(
                    "classifier lists class {} twice",
                    class
                )));
            }
        }
        if seen.is_empty() {
            return Err(ArtifactError::Invalid("classifier has no classes".to_string()));
        }

        Ok(Self {
            model: ModelSlot::Ready(classifier),
        })
    }

    /// An engine whose every call reports [`Error::ModelUnavailable`].
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            model: ModelSlot::Unavailable(reason.into()),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.model, ModelSlot::Ready(_))
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        match &self.model {
            ModelSlot::Ready(classifier) => Some(classifier.feature_names()),
            ModelSlot::Unavailable(_) => None,
        }
    }

    pub fn predict(&self, vector: &EncodedVector) -> Result<PredictionResult> {
        let classifier = match &self.model {
            ModelSlot::Ready(classifier) => classifier,
            ModelSlot::Unavailable(reason) => return Err(Error::ModelUnavailable(reason.clone())),
        };

        check_alignment(classifier.feature_names(), vector.columns())?;

        let probs = classifier.predict_proba(vector.values())?;
        let classes = classifier.classes();
        if probs.len() != classes.len() {
            return Err(Error::Inference(format!(
                "classifier returned {} probabilities for {} classes",
                probs.len(),
                classes.len()
            )));
        }
        if let Some(bad) = probs.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(Error::Inference(format!("classifier returned probability {}", bad)));
        }

        let mut ranked: Vec<(Party, f64)> = classes
            .iter()
            .zip(probs.iter())
            .filter_map(|(class, prob)| Party::from_class_id(*class).map(|party| (party, *prob)))
            .collect();
        // Stable sort: equal probabilities keep the lower class id first.
        ranked.sort_by_key(|(party, _)| party.class_id());
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(build_result(&ranked))
    }
}

fn check_alignment(expected: &[String], actual: &[String]) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    if expected.len() != actual.len() {
        return Err(Error::ColumnMismatch(format!(
            "classifier expects {} columns, vector has {}",
            expected.len(),
            actual.len()
        )));
    }
    let mismatch = expected
        .iter()
        .zip(actual)
        .enumerate()
        .find(|(_, (want, got))| want != got);
    match mismatch {
        Some((position, (want, got))) => Err(Error::ColumnMismatch(format!(
            "column {} is '{}', classifier expects '{}'",
            position, got, want
        ))),
        None => Ok(()),
    }
}

fn build_result(ranked: &[(Party, f64)]) -> PredictionResult {
    let confidence = |prob: f64| round_to(prob * 100.0, 2);

    let top_predictions: Vec<PartyConfidence> = ranked
        .iter()
        .take(TOP_K)
        .map(|(party, prob)| PartyConfidence {
            party: *party,
            confidence: confidence(*prob),
        })
        .collect();

    let mut probabilities: BTreeMap<Party, f64> =
        Party::ALL.iter().map(|party| (*party, 0.0)).collect();
    for (party, prob) in ranked {
        probabilities.insert(*party, confidence(*prob));
    }

    let (winner, winner_confidence) = top_predictions
        .first()
        .map(|top| (top.party, top.confidence))
        .unwrap_or((Party::Other, 0.0));

    PredictionResult {
        winner,
        confidence: winner_confidence,
        top_predictions,
        probabilities,
    }
}
