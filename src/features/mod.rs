pub mod engineered;
pub mod onehot;
pub mod survey;

pub use engineered::{EngineeredFeatures, ENGINEERED_FEATURES};
pub use onehot::{CategoricalEncoder, CategoricalFeature};
pub use survey::{Answer, NormalizedSurvey, RawSurveyResponse, UNKNOWN};

use crate::error::{ArtifactError, Result};
use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Survey questions whose answers are one-hot encoded, in training order.
pub const RAW_FEATURES: [&str; 18] = [
    "age_bracket",
    "education_level",
    "household_income",
    "socioeconomic_class",
    "housing_status",
    "constituency_leaning",
    "vote_national",
    "vote_local",
    "satisfaction_national_government",
    "importance_economy",
    "importance_social_issues",
    "support_welfare_spending",
    "tax_on_wealthy",
    "trust_mainstream_media",
    "concern_political_corruption",
    "climate_priority",
    "immigration_policy_stance",
    "trust_public_institutions",
];

/// Feature row in the classifier's column order.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedVector {
    columns: Arc<[String]>,
    values: Vec<f64>,
}

impl EncodedVector {
    pub fn new(columns: Arc<[String]>, values: Vec<f64>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|name| name == column)
            .map(|index| self.values[index])
    }
}

#[derive(Debug, Clone, Copy)]
enum ColumnSource {
    OneHot(usize),
    Engineered(usize),
    Absent,
}

/// Turns a survey payload into the exact feature row the classifier expects.
///
/// The one-hot block and the engineered block are matched to the classifier's
/// columns by name once, at construction. Columns the classifier wants but this
/// encoder cannot produce are filled with zero; produced columns the classifier
/// never saw are dropped.
#[derive(Debug, Clone)]
pub struct FeatureEncoder {
    categorical: Arc<CategoricalEncoder>,
    columns: Arc<[String]>,
    plan: Vec<ColumnSource>,
}

impl FeatureEncoder {
    pub fn new(
        categorical: Arc<CategoricalEncoder>,
        expected_columns: Vec<String>,
    ) -> std::result::Result<Self, ArtifactError> {
        let inputs: Vec<&str> = categorical.feature_names_in().collect();
        if inputs != RAW_FEATURES {
            return Err(ArtifactError::Invalid(format!(
                "categorical encoder was fitted on {:?}, expected the {} raw survey features",
                inputs,
                RAW_FEATURES.len()
            )));
        }

        let mut available: HashMap<&str, ColumnSource> = HashMap::new();
        for (index, name) in categorical.feature_names_out().iter().enumerate() {
            available.insert(name.as_str(), ColumnSource::OneHot(index));
        }
        for (index, name) in ENGINEERED_FEATURES.iter().enumerate() {
            available.insert(*name, ColumnSource::Engineered(index));
        }

        let plan: Vec<ColumnSource> = expected_columns
            .iter()
            .map(|column| {
                available
                    .get(column.as_str())
                    .copied()
                    .unwrap_or(ColumnSource::Absent)
            })
            .collect();

        let absent = plan
            .iter()
            .filter(|source| matches!(source, ColumnSource::Absent))
            .count();
        if absent > 0 {
            warn!(
                "{} of {} classifier columns are not produced by the encoder and will be zero-filled",
                absent,
                plan.len()
            );
        }
        let dropped = available.len().saturating_sub(plan.len() - absent);
        if dropped > 0 {
            debug!("{} encoded columns are unused by the classifier", dropped);
        }

        Ok(Self {
            categorical,
            columns: expected_columns.into(),
            plan,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn encode(&self, raw: &RawSurveyResponse) -> EncodedVector {
        let survey = raw.normalize().with_sentinels(&RAW_FEATURES);
        let one_hot = self.categorical.transform(&survey);
        let engineered = EngineeredFeatures::from_survey(&survey).values();

        let values = self
            .plan
            .iter()
            .map(|source| match *source {
                ColumnSource::OneHot(index) => one_hot[index],
                ColumnSource::Engineered(index) => engineered[index],
                ColumnSource::Absent => 0.0,
            })
            .collect();

        EncodedVector::new(Arc::clone(&self.columns), values)
    }

    pub fn encode_json(&self, payload: &Value) -> Result<EncodedVector> {
        let raw = RawSurveyResponse::from_json(payload)?;
        Ok(self.encode(&raw))
    }
}
