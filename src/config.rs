use log::{info, warn};
use std::env;
use std::fmt::Display;
use std::str::FromStr;

pub struct Config {
    pub database_url: String,
    pub model_path: String,
    pub encoder_path: String,
    /// Seconds between national estimate log lines. `0` turns the report off.
    pub report_interval_seconds: u64,
    pub history_limit: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:trusty_forecast.db".to_string()),
            model_path: env::var("MODEL_PATH").unwrap_or_else(|_| "models/classifier.json".to_string()),
            encoder_path: env::var("ENCODER_PATH")
                .unwrap_or_else(|_| "models/encoder.json".to_string()),
            report_interval_seconds: parse_or("NATIONAL_REPORT_INTERVAL_SECONDS", 300),
            history_limit: parse_or("HISTORY_LIMIT", 50),
        }
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    parse_value(key, env::var(key).ok(), default)
}

fn parse_value<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {} value '{}': {}, using default {}", key, raw, e, default);
            default
        }),
        None => {
            info!("{} not set, using default: {}", key, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparseable_numbers_fall_back_to_default() {
        let interval = parse_value("NATIONAL_REPORT_INTERVAL_SECONDS", Some("soon".to_string()), 300_u64);
        assert_eq!(interval, 300);
        assert_eq!(parse_value("HISTORY_LIMIT", Some(" 12 ".to_string()), 50_u32), 12);
        assert_eq!(parse_value("HISTORY_LIMIT", Some("-3".to_string()), 50_u32), 50);
        assert_eq!(parse_value("HISTORY_LIMIT", None, 7_u32), 7);
    }

    #[test]
    fn unset_variable_reads_as_default() {
        assert_eq!(parse_or("TRUSTY_FORECAST_NEVER_SET_IN_TESTS", 9_u64), 9);
    }
}
