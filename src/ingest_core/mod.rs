//! Ingestor core - branch watchers that consolidate inbox files into the ledger

pub mod layout;
pub mod pool;
pub mod watcher;

pub use layout::BranchLayout;
pub use pool::spawn_watchers;
pub use watcher::{BranchWatcher, FileOutcome, IngestContext, ScanStats};

use crate::ipc::IpcError;
use crate::ledger::LedgerError;

#[derive(Debug)]
pub enum IngestError {
    Io(std::io::Error),
    Ipc(IpcError),
    Ledger(LedgerError),
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io(err)
    }
}

impl From<IpcError> for IngestError {
    fn from(err: IpcError) -> Self {
        IngestError::Ipc(err)
    }
}

impl From<LedgerError> for IngestError {
    fn from(err: LedgerError) -> Self {
        IngestError::Ledger(err)
    }
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Io(e) => write!(f, "IO error: {}", e),
            IngestError::Ipc(e) => write!(f, "IPC error: {}", e),
            IngestError::Ledger(e) => write!(f, "Ledger error: {}", e),
        }
    }
}

impl std::error::Error for IngestError {}
