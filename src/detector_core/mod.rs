//! Detector core - fraud pattern rules, the pass engine and the worker threads

pub mod accumulator;
pub mod engine;
pub mod results;
pub mod rule;
pub mod summary;
pub mod worker;

pub use engine::{run_pass, PassReport, PatternHit};
pub use rule::{builtin_rules, PatternRule};
pub use summary::PassSummaryWriter;
pub use worker::{listen_for_notifications, spawn_pattern_workers, DetectorContext, PatternWorker};

use crate::ipc::IpcError;
use crate::ledger::LedgerError;

#[derive(Debug)]
pub enum DetectError {
    Io(std::io::Error),
    Ipc(IpcError),
    Ledger(LedgerError),
}

impl From<std::io::Error> for DetectError {
    fn from(err: std::io::Error) -> Self {
        DetectError::Io(err)
    }
}

impl From<IpcError> for DetectError {
    fn from(err: IpcError) -> Self {
        DetectError::Ipc(err)
    }
}

impl From<LedgerError> for DetectError {
    fn from(err: LedgerError) -> Self {
        DetectError::Ledger(err)
    }
}

impl std::fmt::Display for DetectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectError::Io(e) => write!(f, "IO error: {}", e),
            DetectError::Ipc(e) => write!(f, "IPC error: {}", e),
            DetectError::Ledger(e) => write!(f, "Ledger read failed: {}", e),
        }
    }
}

impl std::error::Error for DetectError {}
