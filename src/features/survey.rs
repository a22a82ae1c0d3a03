use crate::error::{Error, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Value substituted for any raw feature the respondent did not answer.
pub const UNKNOWN: &str = "unknown";

/// A single survey answer as it arrives from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    Number(f64),
    Flag(bool),
}

impl Answer {
    /// Text form used to match the answer against a trained category vocabulary.
    pub fn canonical(&self) -> String {
        match self {
            Answer::Text(text) => text.clone(),
            Answer::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                format!("{}", *n as i64)
            }
            Answer::Number(n) => format!("{}", n),
            Answer::Flag(flag) => flag.to_string(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Answer::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for Answer {
    fn from(value: &str) -> Self {
        Answer::Text(value.to_string())
    }
}

impl From<String> for Answer {
    fn from(value: String) -> Self {
        Answer::Text(value)
    }
}

impl From<f64> for Answer {
    fn from(value: f64) -> Self {
        Answer::Number(value)
    }
}

impl From<i64> for Answer {
    fn from(value: i64) -> Self {
        Answer::Number(value as f64)
    }
}

impl From<bool> for Answer {
    fn from(value: bool) -> Self {
        Answer::Flag(value)
    }
}

/// Survey answers keyed by question, exactly as submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSurveyResponse {
    answers: BTreeMap<String, Answer>,
}

impl RawSurveyResponse {
    /// Accepts any JSON object. `null` answers are dropped and later treated as
    /// unanswered; arrays and nested objects are rejected.
    pub fn from_json(payload: &Value) -> Result<Self> {
        let object = payload.as_object().ok_or_else(|| {
            Error::MalformedPayload(format!(
                "survey must be a JSON object, got {}",
                json_kind(payload)
            ))
        })?;

        let mut answers = BTreeMap::new();
        for (key, value) in object {
            let answer = match value {
                Value::Null => continue,
                Value::String(text) => Answer::Text(text.clone()),
                Value::Bool(flag) => Answer::Flag(*flag),
                Value::Number(number) => match number.as_f64() {
                    Some(n) => Answer::Number(n),
                    None => {
                        return Err(Error::MalformedPayload(format!(
                            "answer for '{}' is not a representable number",
                            key
                        )));
                    }
                },
                other => {
                    return Err(Error::MalformedPayload(format!(
                        "answer for '{}' must be text, number or boolean, got {}",
                        key,
                        json_kind(other)
                    )));
                }
            };
            answers.insert(key.clone(), answer);
        }

        Ok(Self { answers })
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Trims and lower-cases keys and text answers.
    ///
    /// Raw keys are visited in byte order, so when two keys normalize to the
    /// same question the later one wins (`climate_priority` over
    /// `Climate_Priority`). Each collision is logged.
    pub fn normalize(&self) -> NormalizedSurvey {
        let mut answers: BTreeMap<String, Answer> = BTreeMap::new();
        let mut sources: BTreeMap<String, &str> = BTreeMap::new();
        for (key, answer) in &self.answers {
            let normalized = key.trim().to_lowercase();
            let answer = match answer {
                Answer::Text(text) => Answer::Text(text.trim().to_lowercase()),
                other => other.clone(),
            };
            if let Some(previous) = sources.insert(normalized.clone(), key) {
                warn!(
                    "Survey keys '{}' and '{}' both normalize to '{}', keeping '{}'",
                    previous, key, normalized, key
                );
            }
            answers.insert(normalized, answer);
        }
        NormalizedSurvey { answers }
    }
}

impl<K, V> FromIterator<(K, V)> for RawSurveyResponse
where
    K: Into<String>,
    V: Into<Answer>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            answers: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

/// Answers after key and text normalization (trimmed, lower-cased).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedSurvey {
    answers: BTreeMap<String, Answer>,
}

impl NormalizedSurvey {
    /// Fills every listed key that has no answer with the `"unknown"` sentinel.
    pub fn with_sentinels(mut self, keys: &[&str]) -> Self {
        for key in keys {
            self.answers
                .entry((*key).to_string())
                .or_insert_with(|| Answer::Text(UNKNOWN.to_string()));
        }
        self
    }

    pub fn answer(&self, key: &str) -> Option<&Answer> {
        self.answers.get(key)
    }

    /// Text answer for `key`, or the sentinel. Non-text answers never match a
    /// lookup table, so they read as `None`.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.answers.get(key) {
            Some(answer) => answer.as_text(),
            None => Some(UNKNOWN),
        }
    }

    pub fn category(&self, key: &str) -> String {
        self.answers
            .get(key)
            .map(Answer::canonical)
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
