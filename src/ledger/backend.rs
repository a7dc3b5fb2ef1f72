//! Ledger backend trait
//!
//! Defines the interface shared by the file and shared-memory ledger backings.
//! Callers hold the cross-process semaphore; backends do no locking of their own.

#[derive(Debug)]
pub enum LedgerError {
    Io(std::io::Error),
    CapacityExceeded { required: usize, available: usize },
    Segment(String),
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err)
    }
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::Io(e) => write!(f, "IO error: {}", e),
            LedgerError::CapacityExceeded {
                required,
                available,
            } => write!(
                f,
                "Arena capacity exceeded: {} bytes required, {} available",
                required, available
            ),
            LedgerError::Segment(msg) => write!(f, "Shared memory error: {}", msg),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Backend trait for the consolidated ledger
pub trait LedgerBackend: Send {
    /// Append complete ledger lines, byte for byte; returns the number of
    /// lines written.
    ///
    /// Either every line lands or none do.
    fn append_lines(&mut self, lines: &[Vec<u8>]) -> Result<usize, LedgerError>;

    /// Every ledger line, in append order, without terminators
    fn read_all(&self) -> Result<Vec<String>, LedgerError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}

/// Split raw bytes on `\n` without decoding them. Blank lines are dropped.
pub fn split_lines(bytes: &[u8]) -> Vec<Vec<u8>> {
    bytes
        .split(|b| *b == b'\n')
        .filter(|line| !is_blank(line))
        .map(|line| line.to_vec())
        .collect()
}

/// Join lines into one `\n`-terminated block, dropping blank lines.
///
/// Line bytes are copied unchanged. Returns the block and the number of
/// lines it holds.
pub fn encode_lines(lines: &[Vec<u8>]) -> (Vec<u8>, usize) {
    let mut block = Vec::new();
    let mut count = 0;
    for line in lines {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        if is_blank(line) {
            continue;
        }
        block.extend_from_slice(line);
        block.push(b'\n');
        count += 1;
    }
    (block, count)
}

/// Split a raw ledger block into text lines for parsing, tolerating
/// non-UTF-8 bytes
pub fn decode_lines(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|b| *b == b'\n')
        .map(|raw| String::from_utf8_lossy(raw).trim_end_matches('\r').to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// `<branch_code>;<line>`
pub fn prefix_line(branch_code: &str, line: &[u8]) -> Vec<u8> {
    let mut prefixed = Vec::with_capacity(branch_code.len() + 1 + line.len());
    prefixed.extend_from_slice(branch_code.as_bytes());
    prefixed.push(super::record::FIELD_SEPARATOR as u8);
    prefixed.extend_from_slice(line);
    prefixed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(items: &[&[u8]]) -> Vec<Vec<u8>> {
        items.iter().map(|s| s.to_vec()).collect()
    }

    #[test]
    fn test_encode_skips_blank_and_terminates() {
        let lines = raw(&[b"a;b", b"", b"c;d\r\n", b"   "]);
        let (block, count) = encode_lines(&lines);
        assert_eq!(block, b"a;b\nc;d\r\n");
        assert_eq!(count, 2);
    }

    #[test]
    fn test_encode_keeps_non_utf8_bytes() {
        let (block, count) = encode_lines(&raw(&[b"OPE1;73 \x80;Pe\xf1a"]));
        assert_eq!(block, b"OPE1;73 \x80;Pe\xf1a\n");
        assert_eq!(count, 1);
    }

    #[test]
    fn test_split_lines_is_byte_exact() {
        assert_eq!(
            split_lines(b"x\xf1\r\n\n  \ny\n"),
            raw(&[b"x\xf1\r", b"y"])
        );
        assert!(split_lines(b"").is_empty());
    }

    #[test]
    fn test_decode_ignores_trailing_newline() {
        assert_eq!(decode_lines(b"x\ny\n"), vec!["x".to_string(), "y".to_string()]);
        assert!(decode_lines(b"").is_empty());
    }

    #[test]
    fn test_prefix_line() {
        assert_eq!(prefix_line("SU001", b"OPE1;x"), b"SU001;OPE1;x");
    }
}
