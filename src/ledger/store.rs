//! Unified ledger interface
//!
//! Routes appends and reads to either the ledger file or the shared-memory
//! arena based on configuration. The Ingestor owns a `LedgerStore`; the
//! Detector only ever reads, through a `LedgerReader`.

use super::arena::{payload_of, Arena};
use super::backend::{decode_lines, prefix_line, split_lines, LedgerBackend, LedgerError};
use super::file_store::FileLedger;
use super::shm::{SegmentView, SharedSegment};
use crate::config::BackendType;
use std::path::Path;

/// Writer-side ledger, owned by the Ingestor
pub enum LedgerStore {
    File(FileLedger),
    Arena {
        arena: Arena<SharedSegment>,
        ledger_file: FileLedger,
    },
}

impl LedgerStore {
    /// Open the ledger for the configured backing.
    ///
    /// For the arena this creates the segment and preloads whatever the
    /// ledger file already holds; a preload that does not fit is an error.
    pub fn open(backend: &BackendType, ledger_path: &Path) -> Result<Self, LedgerError> {
        let ledger_file = FileLedger::new(ledger_path);
        match backend {
            BackendType::File => Ok(LedgerStore::File(ledger_file)),
            BackendType::Arena(cfg) => {
                let segment = SharedSegment::create(&cfg.name, cfg.capacity)?;
                let mut arena = Arena::fresh(segment)?;

                let existing = split_lines(&ledger_file.read_bytes()?);
                let loaded = arena.append_lines(&existing)?;
                log::info!(
                    "🧠 Shared memory {} ready: {} bytes, {} records preloaded from {}",
                    cfg.name,
                    arena.capacity(),
                    loaded,
                    ledger_path.display()
                );

                Ok(LedgerStore::Arena { arena, ledger_file })
            }
        }
    }

    /// Append raw branch lines, prefixing each with `<branch_code>;`.
    /// The line bytes themselves are stored unchanged.
    ///
    /// Returns the number of records written.
    pub fn append(&mut self, branch_code: &str, lines: &[Vec<u8>]) -> Result<usize, LedgerError> {
        let prefixed: Vec<Vec<u8>> = lines
            .iter()
            .map(|l| l.strip_suffix(b"\n").unwrap_or(l))
            .filter(|l| !l.iter().all(|b| b.is_ascii_whitespace()))
            .map(|l| prefix_line(branch_code, l))
            .collect();

        match self {
            LedgerStore::File(f) => f.append_lines(&prefixed),
            LedgerStore::Arena { arena, .. } => arena.append_lines(&prefixed),
        }
    }

    pub fn read_all(&self) -> Result<Vec<String>, LedgerError> {
        match self {
            LedgerStore::File(f) => f.read_all(),
            LedgerStore::Arena { arena, .. } => arena.read_all(),
        }
    }

    /// Get backend type for logging
    pub fn backend_type(&self) -> &'static str {
        match self {
            LedgerStore::File(f) => f.backend_type(),
            LedgerStore::Arena { arena, .. } => arena.backend_type(),
        }
    }

    /// Dump the arena contents over the ledger file. No-op for file backing.
    ///
    /// Returns the number of bytes written.
    pub fn flush_to_file(&self) -> Result<usize, LedgerError> {
        match self {
            LedgerStore::File(_) => Ok(0),
            LedgerStore::Arena { arena, ledger_file } => {
                let bytes = arena.contents();
                ledger_file.replace_contents(bytes)?;
                Ok(bytes.len())
            }
        }
    }

    /// Name of the shared segment, if arena-backed
    pub fn segment_name(&self) -> Option<&str> {
        match self {
            LedgerStore::File(_) => None,
            LedgerStore::Arena { arena, .. } => Some(arena.region().name()),
        }
    }
}

/// Reader-side ledger access, used by the Detector
#[derive(Debug, Clone)]
pub enum LedgerReader {
    File(FileLedger),
    Arena { segment_name: String },
}

impl LedgerReader {
    pub fn new(backend: &BackendType, ledger_path: &Path) -> Self {
        match backend {
            BackendType::File => LedgerReader::File(FileLedger::new(ledger_path)),
            BackendType::Arena(cfg) => LedgerReader::Arena {
                segment_name: cfg.name.clone(),
            },
        }
    }

    /// Snapshot every ledger line. The segment is mapped for the duration
    /// of this call only.
    pub fn read_all(&self) -> Result<Vec<String>, LedgerError> {
        match self {
            LedgerReader::File(f) => f.read_all(),
            LedgerReader::Arena { segment_name } => {
                let view = SegmentView::open(segment_name)?;
                Ok(decode_lines(payload_of(view.as_slice())))
            }
        }
    }

    pub fn backend_type(&self) -> &'static str {
        match self {
            LedgerReader::File(_) => "file",
            LedgerReader::Arena { .. } => "shared-memory",
        }
    }
}
