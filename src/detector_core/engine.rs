//! One detection pass over a ledger snapshot
//!
//! Pure: takes the lines read under the semaphore and returns the flagged
//! keys. Keys are kept in a sorted map so an unchanged ledger always yields
//! byte-identical results.

use super::accumulator::Aggregate;
use super::rule::PatternRule;
use crate::ledger::TransactionRecord;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternHit {
    pub key: String,
    pub aggregate: Aggregate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub rule_id: u8,
    /// Lines seen, malformed ones included
    pub scanned: usize,
    /// Malformed lines
    pub skipped: usize,
    /// Distinct keys accumulated
    pub keys: usize,
    /// Flagged keys, sorted
    pub hits: Vec<PatternHit>,
}

pub fn run_pass(rule: &PatternRule, lines: &[String]) -> PassReport {
    let mut accumulators: BTreeMap<String, Aggregate> = BTreeMap::new();
    let mut skipped = 0;

    for line in lines {
        let record = match TransactionRecord::parse_ledger_line(line) {
            Ok(record) => record,
            Err(e) => {
                skipped += 1;
                log::debug!("Pattern {:02}: skipping malformed line ({}): {}", rule.id, e, line);
                continue;
            }
        };

        if !rule.filter.matches(&record) {
            continue;
        }

        accumulators
            .entry(rule.scope.key(&record))
            .or_insert_with(|| Aggregate::empty(rule.aggregate))
            .absorb(&record);
    }

    if skipped > 0 {
        log::warn!("⚠️  Pattern {:02}: {} malformed ledger lines skipped", rule.id, skipped);
    }

    let keys = accumulators.len();
    let hits = accumulators
        .into_iter()
        .filter(|(_, aggregate)| rule.threshold.is_met(aggregate))
        .map(|(key, aggregate)| PatternHit { key, aggregate })
        .collect();

    PassReport {
        rule_id: rule.id,
        scanned: lines.len(),
        skipped,
        keys,
        hits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector_core::rule::builtin_rules;

    fn rule(id: u8) -> PatternRule {
        builtin_rules().into_iter().find(|r| r.id == id).unwrap()
    }

    fn line(user: &str, start: &str, subtype: u8, amount: &str, status: &str) -> String {
        format!(
            "SU001;OPE;{};{};{};OP;{};{};{}",
            start, start, user, subtype, amount, status
        )
    }

    fn same_hour(user: &str, n: usize) -> Vec<String> {
        (0..n)
            .map(|i| line(user, &format!("12/03/2024 09:{:02}:00", i * 5), 1, "10 €", "Finalizado"))
            .collect()
    }

    #[test]
    fn test_rule1_boundary() {
        let report = run_pass(&rule(1), &same_hour("USER144", 5));
        assert!(report.hits.is_empty());

        let report = run_pass(&rule(1), &same_hour("USER144", 6));
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].key, "USER144@12/03/2024 09:00");
        assert_eq!(report.hits[0].aggregate, Aggregate::Count(6));
    }

    #[test]
    fn test_rule1_separates_hours() {
        let mut lines = same_hour("U1", 3);
        lines.extend(
            (0..3).map(|i| line("U1", &format!("12/03/2024 10:0{}:00", i), 1, "1", "Finalizado")),
        );
        assert!(run_pass(&rule(1), &lines).hits.is_empty());
    }

    #[test]
    fn test_rule2_counts_simultaneous_withdrawals() {
        let mut lines: Vec<String> = (0..4)
            .map(|_| line("U2", "12/03/2024 11:00:00", 2, "-50 €", "Finalizado"))
            .collect();
        // Deposit at the same instant does not count
        lines.push(line("U3", "12/03/2024 11:00:00", 2, "50 €", "Finalizado"));
        let report = run_pass(&rule(2), &lines);
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].key, "U2@12/03/2024 11:00:00");
        assert_eq!(report.keys, 1);
    }

    #[test]
    fn test_rule3_counts_errors_per_day() {
        let lines: Vec<String> = (0..4)
            .map(|i| line("U3", &format!("12/03/2024 0{}:00:00", i), 1, "1", "Error"))
            .chain(std::iter::once(line("U3", "12/03/2024 09:00:00", 1, "1", "Finalizado")))
            .collect();
        let report = run_pass(&rule(3), &lines);
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].aggregate, Aggregate::Count(4));
    }

    #[test]
    fn test_rule4_requires_all_subtypes() {
        let mut lines: Vec<String> = (1..=3)
            .map(|s| line("U4", "12/03/2024 08:00:00", s, "1", "Finalizado"))
            .collect();
        assert!(run_pass(&rule(4), &lines).hits.is_empty());

        lines.push(line("U4", "12/03/2024 18:00:00", 4, "1", "Finalizado"));
        let report = run_pass(&rule(4), &lines);
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].key, "U4@12/03/2024");
    }

    #[test]
    fn test_rule5_negative_daily_balance() {
        let lines = vec![
            line("U5", "12/03/2024 08:00:00", 1, "100 €", "Finalizado"),
            line("U5", "12/03/2024 09:00:00", 2, "-150 €", "Finalizado"),
            line("U6", "12/03/2024 09:00:00", 2, "-10 €", "Finalizado"),
            line("U6", "12/03/2024 10:00:00", 1, "10 €", "Finalizado"),
        ];
        let report = run_pass(&rule(5), &lines);
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].key, "U5@12/03/2024");
        assert_eq!(report.hits[0].aggregate, Aggregate::Sum(-50));
    }

    #[test]
    fn test_malformed_lines_skipped_and_counted() {
        let mut lines = same_hour("U1", 6);
        lines.push("garbage".to_string());
        lines.push("SU001;OPE;bad date;;U1;OP;1;1;Error".to_string());
        let report = run_pass(&rule(1), &lines);
        assert_eq!(report.scanned, 8);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.hits.len(), 1);
    }

    #[test]
    fn test_hits_sorted_by_key() {
        let mut lines = same_hour("ZED", 6);
        lines.extend(same_hour("ALICE", 6));
        let report = run_pass(&rule(1), &lines);
        let keys: Vec<&str> = report.hits.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, vec!["ALICE@12/03/2024 09:00", "ZED@12/03/2024 09:00"]);
        assert_eq!(report, run_pass(&rule(1), &lines));
    }
}
