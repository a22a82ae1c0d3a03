use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Party codes in classifier label order; the derived `Ord` follows the class id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Lab,
    Con,
    Ld,
    Green,
    Reform,
    Snp,
    Other,
}

impl Party {
    pub const ALL: [Party; 7] = [
        Party::Lab,
        Party::Con,
        Party::Ld,
        Party::Green,
        Party::Reform,
        Party::Snp,
        Party::Other,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Party::Lab => "lab",
            Party::Con => "con",
            Party::Ld => "ld",
            Party::Green => "green",
            Party::Reform => "reform",
            Party::Snp => "snp",
            Party::Other => "other",
        }
    }

    pub fn class_id(self) -> usize {
        self as usize
    }

    pub fn from_class_id(id: usize) -> Option<Party> {
        Party::ALL.get(id).copied()
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Party {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Party::ALL
            .iter()
            .copied()
            .find(|party| party.code() == s.trim())
            .ok_or_else(|| format!("Unknown party code: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyConfidence {
    pub party: Party,
    pub confidence: f64,
}

/// Outcome of one inference call. Confidences are percentages with 2 decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub winner: Party,
    pub confidence: f64,
    pub top_predictions: Vec<PartyConfidence>,
    pub probabilities: BTreeMap<Party, f64>,
}

impl PredictionResult {
    pub fn runner_up(&self) -> Option<Party> {
        self.top_predictions.get(1).map(|entry| entry.party)
    }
}

/// One stored prediction. Append-only; never updated after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: String,
    pub user_id: String,
    pub winner: Party,
    pub runner_up: Option<Party>,
    pub confidence: f64,
    pub region: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PredictionRecord {
    pub fn new(user_id: String, result: &PredictionResult, region: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            winner: result.winner,
            runner_up: result.runner_up(),
            confidence: result.confidence,
            region,
            created_at: Utc::now(),
        }
    }
}

/// Rounds to the given number of decimals, exact halves to the even digit.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}
