//! Fraud pattern rules
//!
//! Every pattern is the same pass with different parameters: how records are
//! keyed, which records count, what is accumulated per key, and the threshold
//! that flags a key.
//!
//! | # | Key                         | Counts             | Flag when      |
//! |---|-----------------------------|--------------------|----------------|
//! | 1 | user@dd/mm/YYYY HH:00       | every record       | count > 5      |
//! | 2 | user@dd/mm/YYYY HH:MM:SS    | withdrawals        | count > 3      |
//! | 3 | user@dd/mm/YYYY             | status `Error`     | count > 3      |
//! | 4 | user@dd/mm/YYYY             | subtype presence   | all of 1..=4   |
//! | 5 | user@dd/mm/YYYY             | signed amount sum  | sum < 0        |

use super::accumulator::{Aggregate, AggregateKind};
use crate::ledger::TransactionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyScope {
    /// Calendar hour of the start time
    Hour,
    /// Exact start timestamp
    Instant,
    /// Calendar day of the start time
    Day,
}

impl KeyScope {
    fn time_format(&self) -> &'static str {
        match self {
            KeyScope::Hour => "%d/%m/%Y %H:00",
            KeyScope::Instant => "%d/%m/%Y %H:%M:%S",
            KeyScope::Day => "%d/%m/%Y",
        }
    }

    pub fn key(&self, record: &TransactionRecord) -> String {
        format!(
            "{}@{}",
            record.user_id,
            record.start_time.format(self.time_format())
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFilter {
    All,
    Withdrawals,
    Status(&'static str),
}

impl RecordFilter {
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        match self {
            RecordFilter::All => true,
            RecordFilter::Withdrawals => record.is_withdrawal(),
            RecordFilter::Status(status) => record.status == *status,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    CountAbove(u64),
    SumBelow(i64),
    AllSubtypes,
}

impl Threshold {
    pub fn is_met(&self, aggregate: &Aggregate) -> bool {
        match (self, aggregate) {
            (Threshold::CountAbove(limit), Aggregate::Count(n)) => n > limit,
            (Threshold::SumBelow(limit), Aggregate::Sum(total)) => total < limit,
            (Threshold::AllSubtypes, Aggregate::Subtypes(seen)) => seen.iter().all(|s| *s),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternRule {
    pub id: u8,
    pub description: &'static str,
    pub metric_label: &'static str,
    pub scope: KeyScope,
    pub filter: RecordFilter,
    pub aggregate: AggregateKind,
    pub threshold: Threshold,
}

impl PatternRule {
    /// `NN:::<description>:::Key=<key>:::<label>[=<value>]`
    pub fn format_hit(&self, key: &str, aggregate: &Aggregate) -> String {
        let metric = match aggregate.value() {
            Some(value) => format!("{}={}", self.metric_label, value),
            None => self.metric_label.to_string(),
        };
        format!(
            "{:02}:::{}:::Key={}:::{}",
            self.id, self.description, key, metric
        )
    }
}

/// The five fraud patterns, in id order
pub fn builtin_rules() -> Vec<PatternRule> {
    vec![
        PatternRule {
            id: 1,
            description: "Fraud pattern 1 record",
            metric_label: "Records in the same hour",
            scope: KeyScope::Hour,
            filter: RecordFilter::All,
            aggregate: AggregateKind::Count,
            threshold: Threshold::CountAbove(5),
        },
        PatternRule {
            id: 2,
            description: "Fraud pattern 2 record",
            metric_label: "Simultaneous withdrawals",
            scope: KeyScope::Instant,
            filter: RecordFilter::Withdrawals,
            aggregate: AggregateKind::Count,
            threshold: Threshold::CountAbove(3),
        },
        PatternRule {
            id: 3,
            description: "Fraud pattern 3 record",
            metric_label: "Records with Error",
            scope: KeyScope::Day,
            filter: RecordFilter::Status("Error"),
            aggregate: AggregateKind::Count,
            threshold: Threshold::CountAbove(3),
        },
        PatternRule {
            id: 4,
            description: "Fraud pattern 4 record",
            metric_label: "All operation subtypes",
            scope: KeyScope::Day,
            filter: RecordFilter::All,
            aggregate: AggregateKind::SubtypePresence,
            threshold: Threshold::AllSubtypes,
        },
        PatternRule {
            id: 5,
            description: "Fraud pattern 5 record",
            metric_label: "Negative balance",
            scope: KeyScope::Day,
            filter: RecordFilter::All,
            aggregate: AggregateKind::Sum,
            threshold: Threshold::SumBelow(0),
        },
    ]
}
