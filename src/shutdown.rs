//! SIGINT/SIGTERM handling
//!
//! A dedicated thread waits for the signal, releases the named IPC objects
//! and exits the process. Critical sections in flight are not drained: if a
//! worker holds the ledger semaphore when the signal lands, the other daemon
//! stays blocked on it until it is interrupted too.

use crate::ipc::NamedSemaphore;
use crate::ledger::shm::SharedSegment;
use crate::ledger::LedgerStore;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// What a daemon releases before exiting
pub struct CleanupPlan {
    /// Daemon name, for log lines
    pub role: &'static str,
    pub semaphore_name: String,
    /// Ingestor only: flushed to the ledger file and unlinked if arena-backed
    pub ledger: Option<Arc<Mutex<LedgerStore>>>,
}

impl CleanupPlan {
    /// Release everything. Failures are logged; cleanup always runs to the end.
    pub fn run(&self) {
        log::info!("🛑 {} shutting down", self.role);

        match NamedSemaphore::unlink(&self.semaphore_name) {
            Ok(()) => log::info!("   ├─ Semaphore {} removed", self.semaphore_name),
            // The other daemon may have removed it first
            Err(e) => log::warn!("   ├─ Semaphore {} not removed: {}", self.semaphore_name, e),
        }

        if let Some(ledger) = &self.ledger {
            let store = ledger.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(segment) = store.segment_name() {
                match store.flush_to_file() {
                    Ok(bytes) => log::info!("   ├─ Shared memory flushed to ledger file ({} bytes)", bytes),
                    Err(e) => log::error!("   ├─ Shared memory flush failed: {}", e),
                }
                if let Err(e) = SharedSegment::unlink(segment) {
                    log::warn!("   ├─ Shared memory {} not removed: {}", segment, e);
                }
            }
        }

        log::info!("   └─ {} stopped", self.role);
    }
}

/// Spawn the signal thread. On SIGINT or SIGTERM it runs `plan` and exits 0.
pub fn install(plan: CleanupPlan) -> io::Result<JoinHandle<()>> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    thread::Builder::new()
        .name(format!("{}-signals", plan.role))
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                log::info!("📴 Signal {} received", signal);
                plan.run();
                std::process::exit(0);
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArenaConfig, BackendType};
    use crate::ledger::shm::SegmentView;

    #[test]
    fn test_cleanup_flushes_arena_and_releases_names() {
        let dir = tempfile::tempdir().unwrap();
        let ledger_path = dir.path().join("consolidado.csv");
        let pid = std::process::id();
        let sem_name = format!("/fraudmon_shutdown_sem_{}", pid);
        let shm_name = format!("/fraudmon_shutdown_shm_{}", pid);

        let _sem = NamedSemaphore::open(&sem_name).unwrap();
        let backend = BackendType::Arena(ArenaConfig {
            name: shm_name.clone(),
            capacity: 128,
        });
        let mut store = LedgerStore::open(&backend, &ledger_path).unwrap();
        store.append("SU001", &[b"OPE1;x".to_vec()]).unwrap();

        let plan = CleanupPlan {
            role: "ingestor",
            semaphore_name: sem_name.clone(),
            ledger: Some(Arc::new(Mutex::new(store))),
        };
        plan.run();

        assert_eq!(std::fs::read_to_string(&ledger_path).unwrap(), "SU001;OPE1;x\n");
        assert!(SegmentView::open(&shm_name).is_err());
        assert!(NamedSemaphore::unlink(&sem_name).is_err());
    }

    #[test]
    fn test_cleanup_tolerates_missing_semaphore() {
        let plan = CleanupPlan {
            role: "detector",
            semaphore_name: format!("/fraudmon_shutdown_absent_{}", std::process::id()),
            ledger: None,
        };
        plan.run();
    }
}
