use crate::models::{round_to, Party, PredictionRecord};
use crate::national::{NationalEstimate, NationalSnapshot};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

pub fn calculate_results(records: &[PredictionRecord], now: DateTime<Utc>) -> NationalSnapshot {
    // If no predictions were stored
    if records.is_empty() {
        return NationalSnapshot::NoPredictions;
    }

    // Every record counts, repeat predictions from one user included
    let mut counts: HashMap<Party, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.winner).or_insert(0) += 1;
    }

    let total = records.len();
    let percentages: BTreeMap<Party, f64> = Party::ALL
        .iter()
        .map(|party| {
            let count = counts.get(party).copied().unwrap_or(0);
            (*party, round_to(count as f64 / total as f64 * 100.0, 1))
        })
        .collect();

    NationalSnapshot::Estimate(NationalEstimate {
        winner: plurality_winner(&percentages),
        percentages,
        sample_size: total,
        generated_at: now,
    })
}

/// Highest share wins; equal shares go to the alphabetically first party code.
fn plurality_winner(percentages: &BTreeMap<Party, f64>) -> Party {
    let mut sorted: Vec<(Party, f64)> = percentages.iter().map(|(p, v)| (*p, *v)).collect();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.code().cmp(b.0.code())));
    sorted.first().map(|(party, _)| *party).unwrap_or(Party::Other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(user: &str, winner: Party, minutes: i64) -> PredictionRecord {
        PredictionRecord {
            id: format!("{}-{}", user, minutes),
            user_id: user.to_string(),
            winner,
            runner_up: None,
            confidence: 50.0,
            region: None,
            created_at: Utc::now() + Duration::minutes(minutes),
        }
    }

    fn estimate(snapshot: NationalSnapshot) -> NationalEstimate {
        match snapshot {
            NationalSnapshot::Estimate(estimate) => estimate,
            NationalSnapshot::NoPredictions => panic!("expected an estimate"),
        }
    }

    #[test]
    fn empty_input_is_no_predictions() {
        assert_eq!(calculate_results(&[], Utc::now()), NationalSnapshot::NoPredictions);
    }

    #[test]
    fn unanimous_lab_is_hundred_percent() {
        let records: Vec<_> = (0..5).map(|i| record(&format!("u{}", i), Party::Lab, i)).collect();
        let estimate = estimate(calculate_results(&records, Utc::now()));
        assert_eq!(estimate.winner, Party::Lab);
        assert_eq!(estimate.sample_size, 5);
        assert_eq!(estimate.percentages[&Party::Lab], 100.0);
        for party in Party::ALL.iter().filter(|p| **p != Party::Lab) {
            assert_eq!(estimate.percentages[party], 0.0);
        }
    }

    #[test]
    fn repeat_predictions_all_count() {
        let records = vec![
            record("alice", Party::Con, 0),
            record("alice", Party::Con, 1),
            record("bob", Party::Green, 0),
        ];
        let estimate = estimate(calculate_results(&records, Utc::now()));
        assert_eq!(estimate.sample_size, 3);
        assert_eq!(estimate.percentages[&Party::Con], 66.7);
        assert_eq!(estimate.percentages[&Party::Green], 33.3);
        assert_eq!(estimate.winner, Party::Con);
    }

    #[test]
    fn ties_go_to_lowest_party_code() {
        let records = vec![
            record("a", Party::Snp, 0),
            record("b", Party::Lab, 0),
            record("c", Party::Green, 0),
        ];
        // green < lab < snp
        assert_eq!(estimate(calculate_results(&records, Utc::now())).winner, Party::Green);

        let records = vec![record("a", Party::Reform, 0), record("b", Party::Con, 0)];
        assert_eq!(estimate(calculate_results(&records, Utc::now())).winner, Party::Con);
    }

    #[test]
    fn sixteen_records_round_halves_to_even() {
        let mut records = vec![record("a", Party::Lab, 0)];
        records.extend((1..16).map(|i| record(&format!("u{}", i), Party::Con, i)));
        let estimate = estimate(calculate_results(&records, Utc::now()));
        assert_eq!(estimate.percentages[&Party::Lab], 6.2);
        assert_eq!(estimate.percentages[&Party::Con], 93.8);
        let total: f64 = estimate.percentages.values().sum();
        assert!((total - 100.0).abs() < 1e-9, "total {}", total);
    }

    #[test]
    fn every_party_is_reported() {
        let estimate = estimate(calculate_results(&[record("a", Party::Ld, 0)], Utc::now()));
        assert_eq!(estimate.percentages.len(), Party::ALL.len());
    }
}
