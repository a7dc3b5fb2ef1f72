//! Per-key aggregates built during one detection pass

use crate::ledger::TransactionRecord;

/// Operation subtypes tracked for presence (1..=4)
pub const SUBTYPE_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Count,
    Sum,
    SubtypePresence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Count(u64),
    Sum(i64),
    Subtypes([bool; SUBTYPE_COUNT]),
}

impl Aggregate {
    pub fn empty(kind: AggregateKind) -> Self {
        match kind {
            AggregateKind::Count => Aggregate::Count(0),
            AggregateKind::Sum => Aggregate::Sum(0),
            AggregateKind::SubtypePresence => Aggregate::Subtypes([false; SUBTYPE_COUNT]),
        }
    }

    pub fn absorb(&mut self, record: &TransactionRecord) {
        match self {
            Aggregate::Count(n) => *n += 1,
            Aggregate::Sum(total) => *total = total.saturating_add(record.amount),
            Aggregate::Subtypes(seen) => {
                // Subtypes outside 1..=4 carry no meaning here
                if (1..=SUBTYPE_COUNT as u8).contains(&record.subtype) {
                    seen[(record.subtype - 1) as usize] = true;
                }
            }
        }
    }

    /// Value printed after the metric label, if the metric has one
    pub fn value(&self) -> Option<String> {
        match self {
            Aggregate::Count(n) => Some(n.to_string()),
            Aggregate::Sum(total) => Some(total.to_string()),
            Aggregate::Subtypes(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subtype: u8, amount: i64) -> TransactionRecord {
        let line = format!(
            "SU001;OPE1;12/03/2024 09:47:00;12/03/2024 09:50:00;USER1;OP;{};{};Finalizado",
            subtype, amount
        );
        TransactionRecord::parse_ledger_line(&line).unwrap()
    }

    #[test]
    fn test_count_and_sum() {
        let mut count = Aggregate::empty(AggregateKind::Count);
        let mut sum = Aggregate::empty(AggregateKind::Sum);
        for amount in [10, -30, 5] {
            count.absorb(&record(1, amount));
            sum.absorb(&record(1, amount));
        }
        assert_eq!(count, Aggregate::Count(3));
        assert_eq!(sum, Aggregate::Sum(-15));
        assert_eq!(sum.value().as_deref(), Some("-15"));
    }

    #[test]
    fn test_subtype_presence_ignores_unknown() {
        let mut seen = Aggregate::empty(AggregateKind::SubtypePresence);
        seen.absorb(&record(2, 1));
        seen.absorb(&record(9, 1));
        seen.absorb(&record(0, 1));
        assert_eq!(seen, Aggregate::Subtypes([false, true, false, false]));
        assert!(seen.value().is_none());
    }
}
