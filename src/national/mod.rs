pub mod plurality;

use crate::models::{Party, PredictionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Vote share per party over stored predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationalEstimate {
    pub winner: Party,
    pub percentages: BTreeMap<Party, f64>,
    pub sample_size: usize,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NationalSnapshot {
    NoPredictions,
    Estimate(NationalEstimate),
}

impl NationalSnapshot {
    pub fn estimate(&self) -> Option<&NationalEstimate> {
        match self {
            NationalSnapshot::Estimate(estimate) => Some(estimate),
            NationalSnapshot::NoPredictions => None,
        }
    }
}

pub fn aggregate(records: &[PredictionRecord]) -> NationalSnapshot {
    plurality::calculate_results(records, Utc::now())
}

/// Keeps only each user's newest record. Input order breaks timestamp ties.
pub fn latest_per_user(records: &[PredictionRecord]) -> Vec<PredictionRecord> {
    let mut latest: HashMap<&str, &PredictionRecord> = HashMap::new();
    for record in records {
        latest
            .entry(record.user_id.as_str())
            .and_modify(|current| {
                if record.created_at >= current.created_at {
                    *current = record;
                }
            })
            .or_insert(record);
    }

    let mut kept: Vec<PredictionRecord> = latest.into_values().cloned().collect();
    kept.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    kept
}
