use crate::error::ArtifactError;
use crate::features::survey::NormalizedSurvey;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Vocabulary learned for one categorical input during training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalFeature {
    pub name: String,
    pub categories: Vec<String>,
}

#[derive(Deserialize)]
struct EncoderFile {
    features: Vec<CategoricalFeature>,
}

/// Fitted one-hot encoder. Categories outside the vocabulary encode to all zeros.
#[derive(Debug, Clone)]
pub struct CategoricalEncoder {
    features: Vec<CategoricalFeature>,
    names_out: Vec<String>,
}

impl CategoricalEncoder {
    pub fn new(features: Vec<CategoricalFeature>) -> Result<Self, ArtifactError> {
        let mut seen_features = HashSet::new();
        for feature in &features {
            if !seen_features.insert(feature.name.as_str()) {
                return Err(ArtifactError::Invalid(format!(
                    "encoder lists feature '{}' twice",
                    feature.name
                )));
            }
            let mut seen_categories = HashSet::new();
            for category in &feature.categories {
                if !seen_categories.insert(category.as_str()) {
                    return Err(ArtifactError::Invalid(format!(
                        "encoder feature '{}' lists category '{}' twice",
                        feature.name, category
                    )));
                }
            }
        }

        let names_out = features
            .iter()
            .flat_map(|feature| {
                feature
                    .categories
                    .iter()
                    .map(move |category| format!("{}_{}", feature.name, category))
            })
            .collect();

        Ok(Self { features, names_out })
    }

    pub fn from_json(text: &str, origin: &str) -> Result<Self, ArtifactError> {
        let file: EncoderFile = serde_json::from_str(text).map_err(|source| ArtifactError::Parse {
            path: origin.to_string(),
            source,
        })?;
        Self::new(file.features)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ArtifactError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text, &path.display().to_string())
    }

    pub fn feature_names_in(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(|feature| feature.name.as_str())
    }

    /// Output column names, `"{feature}_{category}"`, in encoding order.
    pub fn feature_names_out(&self) -> &[String] {
        &self.names_out
    }

    pub fn transform(&self, survey: &NormalizedSurvey) -> Vec<f64> {
        let mut encoded = Vec::with_capacity(self.names_out.len());
        for feature in &self.features {
            let value = survey.category(&feature.name);
            encoded.extend(
                feature
                    .categories
                    .iter()
                    .map(|category| if *category == value { 1.0 } else { 0.0 }),
            );
        }
        encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::survey::RawSurveyResponse;

    fn encoder() -> CategoricalEncoder {
        CategoricalEncoder::from_json(
            r#"{"features": [
                {"name": "housing_status", "categories": ["own", "rent", "unknown"]},
                {"name": "vote_local", "categories": ["green", "labour"]}
            ]}"#,
            "inline",
        )
        .unwrap()
    }

    #[test]
    fn names_out_join_feature_and_category() {
        assert_eq!(
            encoder().feature_names_out(),
            &[
                "housing_status_own",
                "housing_status_rent",
                "housing_status_unknown",
                "vote_local_green",
                "vote_local_labour"
            ]
        );
    }

    #[test]
    fn unseen_category_encodes_to_zero_row() {
        let raw: RawSurveyResponse = vec![("housing_status", "Rent"), ("vote_local", "reform")]
            .into_iter()
            .collect();
        let encoded = encoder().transform(&raw.normalize());
        assert_eq!(encoded, vec![0.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn sentinel_matches_trained_unknown_category() {
        let raw = RawSurveyResponse::default();
        let encoded = encoder().transform(&raw.normalize().with_sentinels(&["housing_status"]));
        assert_eq!(encoded, vec![0.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn duplicate_categories_are_rejected() {
        let err = CategoricalEncoder::new(vec![CategoricalFeature {
            name: "vote_local".to_string(),
            categories: vec!["green".to_string(), "green".to_string()],
        }])
        .unwrap_err();
        assert!(matches!(err, ArtifactError::Invalid(_)));
    }

    #[test]
    fn unreadable_file_reports_path() {
        let err = CategoricalEncoder::from_path("/nonexistent/encoder.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/encoder.json"));
    }
}
