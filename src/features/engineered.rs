use crate::features::survey::NormalizedSurvey;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

/// Column names of the engineered features, in the order the model was trained on.
pub const ENGINEERED_FEATURES: [&str; 10] = [
    "is_fiscally_conservative",
    "is_climate_priority",
    "is_media_skeptic",
    "is_snp_region",
    "is_reform_minded",
    "is_social_justice_focused",
    "education_score",
    "income_score",
    "media_trust_score",
    "gov_satisfaction_score",
];

/// Mid-scale score for answers missing from an ordinal table.
pub const NEUTRAL_SCORE: u8 = 2;

const EDUCATION_LEVELS: &[(&str, u8)] = &[
    ("no qualification", 0),
    ("gcse or equivalent", 1),
    ("a-level or equivalent", 2),
    ("bachelors degree", 3),
    ("masters degree", 4),
    ("phd or higher", 5),
    ("other", 2),
];

const INCOME_BANDS: &[(&str, u8)] = &[
    ("under £20,000", 0),
    ("£20,000–£40,000", 1),
    ("£40,000–£60,000", 2),
    ("£60,000-£80,000", 3),
    ("£80,000 +", 4),
];

const TRUST_LEVELS: &[(&str, u8)] = &[
    ("very low", 0),
    ("low", 1),
    ("medium", 2),
    ("high", 3),
    ("very high", 4),
];

const SATISFACTION_LEVELS: &[(&str, u8)] = &[
    ("very dissatisfied", 0),
    ("dissatisfied", 1),
    ("neutral", 2),
    ("satisfied", 3),
    ("very satisfied", 4),
];

lazy_static! {
    static ref RESTRICTIVE_STANCE: Regex = Regex::new(
        r"^(tighten|tighter|tougher|restrict|restrictive|reduce|stricter|strict|decrease|lower|limit|stop)\b"
    )
    .expect("restrictive stance pattern is valid");
}

/// Signals derived from the normalized raw answers. Pure functions of the survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineeredFeatures {
    pub is_fiscally_conservative: bool,
    pub is_climate_priority: bool,
    pub is_media_skeptic: bool,
    pub is_snp_region: bool,
    pub is_reform_minded: bool,
    pub is_social_justice_focused: bool,
    pub education_score: u8,
    pub income_score: u8,
    pub media_trust_score: u8,
    pub gov_satisfaction_score: u8,
}

impl EngineeredFeatures {
    pub fn from_survey(survey: &NormalizedSurvey) -> Self {
        let is = |key: &str, expected: &str| survey.text(key) == Some(expected);

        let media_trust = survey.text("trust_mainstream_media");

        Self {
            is_fiscally_conservative: is("support_welfare_spending", "no")
                && is("tax_on_wealthy", "no"),
            is_climate_priority: is("climate_priority", "yes"),
            is_media_skeptic: matches!(media_trust, Some("low") | Some("very low")),
            is_snp_region: is("constituency_leaning", "scotland"),
            is_reform_minded: is("concern_political_corruption", "very concerned")
                && survey
                    .text("immigration_policy_stance")
                    .is_some_and(is_restrictive_stance),
            is_social_justice_focused: is("importance_social_issues", "very important")
                && is("support_welfare_spending", "yes"),
            education_score: ordinal(EDUCATION_LEVELS, survey.text("education_level")),
            income_score: ordinal(INCOME_BANDS, survey.text("household_income")),
            media_trust_score: ordinal(TRUST_LEVELS, media_trust),
            gov_satisfaction_score: ordinal(
                SATISFACTION_LEVELS,
                survey.text("satisfaction_national_government"),
            ),
        }
    }

    /// Values aligned with [`ENGINEERED_FEATURES`].
    pub fn values(&self) -> [f64; 10] {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        [
            flag(self.is_fiscally_conservative),
            flag(self.is_climate_priority),
            flag(self.is_media_skeptic),
            flag(self.is_snp_region),
            flag(self.is_reform_minded),
            flag(self.is_social_justice_focused),
            f64::from(self.education_score),
            f64::from(self.income_score),
            f64::from(self.media_trust_score),
            f64::from(self.gov_satisfaction_score),
        ]
    }
}

pub fn is_restrictive_stance(stance: &str) -> bool {
    RESTRICTIVE_STANCE.is_match(stance)
}

fn ordinal(table: &[(&str, u8)], answer: Option<&str>) -> u8 {
    answer
        .and_then(|answer| {
            table
                .iter()
                .find(|(label, _)| *label == answer)
                .map(|(_, score)| *score)
        })
        .unwrap_or(NEUTRAL_SCORE)
}
