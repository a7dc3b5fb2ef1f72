//! Consolidated transaction ledger
//!
//! Record parsing plus the two ledger backings (append-only file and
//! shared-memory arena).

pub mod arena;
pub mod backend;
pub mod file_store;
pub mod record;
pub mod shm;
pub mod store;

pub use backend::{LedgerBackend, LedgerError};
pub use record::{RecordError, TransactionRecord};
pub use store::{LedgerReader, LedgerStore};
