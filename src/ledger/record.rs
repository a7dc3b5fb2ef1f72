//! Ledger record parsing
//!
//! Format (one line, `;`-separated, nine fields):
//! `SU001;OPE0001;12/03/2024 09:47:00;12/03/2024 10:14:00;USER144;COMPRA01;1;73 €;Finalizado`

use chrono::NaiveDateTime;

pub const LEDGER_FIELDS: usize = 9;
pub const FIELD_SEPARATOR: char = ';';
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    FieldCount(usize),
    Timestamp(String),
    Subtype(String),
    Amount(String),
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::FieldCount(n) => {
                write!(f, "expected {} fields, found {}", LEDGER_FIELDS, n)
            }
            RecordError::Timestamp(raw) => write!(f, "invalid timestamp '{}'", raw),
            RecordError::Subtype(raw) => write!(f, "invalid operation subtype '{}'", raw),
            RecordError::Amount(raw) => write!(f, "invalid amount '{}'", raw),
        }
    }
}

impl std::error::Error for RecordError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub branch_id: String,
    pub operation_id: String,
    pub start_time: NaiveDateTime,
    /// Not used by any rule; `None` when blank or unparseable
    pub end_time: Option<NaiveDateTime>,
    pub user_id: String,
    pub operation_type: String,
    pub subtype: u8,
    /// Negative = withdrawal, positive = deposit
    pub amount: i64,
    pub status: String,
}

impl TransactionRecord {
    /// Parse one consolidated ledger line.
    ///
    /// Extra trailing fields are ignored; fewer than nine is malformed.
    pub fn parse_ledger_line(line: &str) -> Result<Self, RecordError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let fields: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
        if fields.len() < LEDGER_FIELDS {
            return Err(RecordError::FieldCount(fields.len()));
        }

        let start_raw = fields[2].trim();
        let start_time = NaiveDateTime::parse_from_str(start_raw, TIMESTAMP_FORMAT)
            .map_err(|_| RecordError::Timestamp(start_raw.to_string()))?;
        let end_time = NaiveDateTime::parse_from_str(fields[3].trim(), TIMESTAMP_FORMAT).ok();

        let subtype_raw = fields[6].trim();
        let subtype = subtype_raw
            .parse::<u8>()
            .map_err(|_| RecordError::Subtype(subtype_raw.to_string()))?;

        let amount = parse_amount(fields[7]).ok_or_else(|| RecordError::Amount(fields[7].to_string()))?;

        Ok(Self {
            branch_id: fields[0].trim().to_string(),
            operation_id: fields[1].trim().to_string(),
            start_time,
            end_time,
            user_id: fields[4].trim().to_string(),
            operation_type: fields[5].trim().to_string(),
            subtype,
            amount,
            status: fields[8].trim().to_string(),
        })
    }

    pub fn is_withdrawal(&self) -> bool {
        self.amount < 0
    }
}

/// Leading signed integer of an amount field (`"-120 €"` → `-120`).
///
/// Anything after the digits (currency marker, decimals) is ignored.
pub fn parse_amount(raw: &str) -> Option<i64> {
    let s = raw.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    const LINE: &str =
        "SU001;OPE0001;12/03/2024 09:47:00;12/03/2024 10:14:00;USER144;COMPRA01;1;73 €;Finalizado\n";

    #[test]
    fn test_parse_full_line() {
        let record = TransactionRecord::parse_ledger_line(LINE).unwrap();
        assert_eq!(record.branch_id, "SU001");
        assert_eq!(record.operation_id, "OPE0001");
        assert_eq!(record.user_id, "USER144");
        assert_eq!(record.operation_type, "COMPRA01");
        assert_eq!(record.subtype, 1);
        assert_eq!(record.amount, 73);
        assert_eq!(record.status, "Finalizado");
        assert_eq!(record.start_time.day(), 12);
        assert_eq!(record.start_time.month(), 3);
        assert_eq!(record.start_time.hour(), 9);
        assert!(record.end_time.is_some());
        assert!(!record.is_withdrawal());
    }

    #[test]
    fn test_short_line_is_malformed() {
        let err = TransactionRecord::parse_ledger_line("SU001;OPE0001;12/03/2024 09:47:00").unwrap_err();
        assert_eq!(err, RecordError::FieldCount(3));
    }

    #[test]
    fn test_bad_timestamp_is_malformed() {
        let line = "SU001;OPE1;2024-03-12 09:47;x;USER1;RETIRO;2;-10;Error";
        assert!(matches!(
            TransactionRecord::parse_ledger_line(line),
            Err(RecordError::Timestamp(_))
        ));
    }

    #[test]
    fn test_bad_subtype_is_malformed() {
        let line = "SU001;OPE1;12/03/2024 09:47:00;;USER1;RETIRO;X;-10;Error";
        assert!(matches!(
            TransactionRecord::parse_ledger_line(line),
            Err(RecordError::Subtype(_))
        ));
    }

    #[test]
    fn test_blank_end_time_tolerated() {
        let line = "SU001;OPE1;12/03/2024 09:47:00;;USER1;RETIRO;2;-10;Error";
        let record = TransactionRecord::parse_ledger_line(line).unwrap();
        assert!(record.end_time.is_none());
        assert!(record.is_withdrawal());
    }

    #[test]
    fn test_parse_amount_variants() {
        assert_eq!(parse_amount("73"), Some(73));
        assert_eq!(parse_amount(" -120 €"), Some(-120));
        assert_eq!(parse_amount("+5"), Some(5));
        assert_eq!(parse_amount("12.50"), Some(12));
        assert_eq!(parse_amount("€"), None);
        assert_eq!(parse_amount("-"), None);
    }
}
