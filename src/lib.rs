//! fraudmon - branch ledger consolidation and fraud pattern detection
//!
//! Two cooperating daemons share one ledger:
//! - `ingestor`: one watcher thread per branch inbox moves new files into a
//!   processing folder and appends their lines to the ledger
//! - `detector`: five pattern threads re-scan the ledger whenever the
//!   ingestor signals a change
//!
//! Ledger access from both processes is serialized by a named semaphore;
//! change notifications travel over a named pipe.

pub mod config;
pub mod delay;
pub mod detector_core;
pub mod ingest_core;
pub mod ipc;
pub mod ledger;
pub mod logging;
pub mod shutdown;
