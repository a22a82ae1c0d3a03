pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod handlers;
pub mod inference;
pub mod models;
pub mod national;
pub mod service;
pub mod tasks;

pub use error::{ArtifactError, Error, Result};
pub use features::{EncodedVector, FeatureEncoder, RawSurveyResponse};
pub use inference::{Classifier, InferenceEngine};
pub use models::{Party, PredictionRecord, PredictionResult};
pub use national::{aggregate, NationalEstimate, NationalSnapshot};
pub use service::{Artifacts, PredictionService};
