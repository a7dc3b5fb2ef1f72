//! Append-only ledger file
//!
//! The file is opened in append mode for every write and closed afterwards,
//! so a reader in another process always sees whole appends once the
//! semaphore is released.

use super::backend::{decode_lines, encode_lines, LedgerBackend, LedgerError};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole file as stored. A file that does not exist yet is empty.
    pub fn read_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the whole file with `bytes` (truncate + write)
    pub fn replace_contents(&self, bytes: &[u8]) -> Result<(), LedgerError> {
        let mut file = File::create(&self.path)?;
        file.write_all(bytes)?;
        file.flush()?;
        Ok(())
    }
}

impl LedgerBackend for FileLedger {
    fn append_lines(&mut self, lines: &[Vec<u8>]) -> Result<usize, LedgerError> {
        let (block, count) = encode_lines(lines);
        if count == 0 {
            return Ok(0);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        // Single write so the block is not interleaved with other appenders
        file.write_all(&block)?;
        Ok(count)
    }

    /// A ledger that has never been written is empty, not an error
    fn read_all(&self) -> Result<Vec<String>, LedgerError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut lines = Vec::new();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            lines.extend(decode_lines(&buf));
        }
        Ok(lines)
    }

    fn backend_type(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(items: &[&str]) -> Vec<Vec<u8>> {
        items.iter().map(|s| s.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_append_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = FileLedger::new(dir.path().join("consolidado.csv"));

        let written = ledger
            .append_lines(&raw(&["SU001;a", "SU001;b"]))
            .unwrap();
        assert_eq!(written, 2);
        ledger.append_lines(&raw(&["SU002;c"])).unwrap();

        assert_eq!(
            ledger.read_all().unwrap(),
            vec!["SU001;a", "SU001;b", "SU002;c"]
        );
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::new(dir.path().join("absent.csv"));
        assert!(ledger.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_empty_append_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consolidado.csv");
        let mut ledger = FileLedger::new(&path);
        assert_eq!(ledger.append_lines(&raw(&[""])).unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_replace_contents_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = FileLedger::new(dir.path().join("consolidado.csv"));
        ledger.append_lines(&raw(&["old;1"])).unwrap();
        ledger.replace_contents(b"new;2\n").unwrap();
        assert_eq!(ledger.read_all().unwrap(), vec!["new;2"]);
    }

    #[test]
    fn test_append_writes_bytes_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consolidado.csv");
        let mut ledger = FileLedger::new(&path);
        ledger.append_lines(&[b"SU001;73 \x80;Pe\xf1a".to_vec()]).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"SU001;73 \x80;Pe\xf1a\n");
        assert_eq!(ledger.read_bytes().unwrap(), b"SU001;73 \x80;Pe\xf1a\n");
    }
}
