//! Branch watcher - polls one branch inbox and consolidates its files
//!
//! Per matching file, with the ledger semaphore held:
//! 1. Move the file into the branch processing folder
//! 2. Append its lines to the ledger, prefixed with the branch code
//! 3. Notify the Detector (if enabled)
//!
//! The semaphore is released before the simulated-load pause.

use super::layout::BranchLayout;
use super::IngestError;
use crate::delay::SimulatedLoad;
use crate::ipc::{NamedSemaphore, NotificationSender};
use crate::ledger::backend::split_lines;
use crate::ledger::{LedgerError, LedgerStore};
use crate::logging::AuditLog;
use chrono::Local;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Everything the branch watchers share
pub struct IngestContext {
    pub semaphore: Arc<NamedSemaphore>,
    pub ledger: Arc<Mutex<LedgerStore>>,
    /// `None` when notifications are disabled
    pub notifier: Option<NotificationSender>,
    pub audit: Arc<AuditLog>,
    pub load: SimulatedLoad,
    pub poll_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Merged { records: usize, notified: bool },
    /// Rename failed; the file was left in the inbox
    MoveFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub merged_files: usize,
    pub records: usize,
    pub failures: usize,
}

pub struct BranchWatcher {
    branch: BranchLayout,
    ctx: Arc<IngestContext>,
}

impl BranchWatcher {
    pub fn new(branch: BranchLayout, ctx: Arc<IngestContext>) -> Self {
        Self { branch, ctx }
    }

    pub fn branch(&self) -> &BranchLayout {
        &self.branch
    }

    /// Poll forever
    pub fn run(&self) {
        log::info!(
            "👀 Branch {:02} watching {}",
            self.branch.index,
            self.branch.inbox.display()
        );
        loop {
            self.scan_once();
            thread::sleep(self.ctx.poll_interval);
        }
    }

    /// One pass over the inbox
    pub fn scan_once(&self) -> ScanStats {
        let mut stats = ScanStats::default();

        let entries = match fs::read_dir(&self.branch.inbox) {
            Ok(entries) => entries,
            Err(e) => {
                log::error!(
                    "❌ Branch {:02}: cannot read inbox {}: {}",
                    self.branch.index,
                    self.branch.inbox.display(),
                    e
                );
                return stats;
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| self.branch.accepts(name))
            .collect();
        names.sort();

        for name in names {
            let source = self.branch.inbox.join(&name);

            // Vanishing between listing and stat is normal with concurrent producers
            let metadata = match fs::metadata(&source) {
                Ok(m) => m,
                Err(e) => {
                    log::warn!(
                        "⚠️  Branch {:02}: cannot stat {}: {}",
                        self.branch.index,
                        source.display(),
                        e
                    );
                    continue;
                }
            };
            if !metadata.is_file() {
                continue;
            }

            match self.consolidate(&source, &name) {
                Ok(FileOutcome::Merged { records, .. }) => {
                    stats.merged_files += 1;
                    stats.records += records;
                }
                Ok(FileOutcome::MoveFailed) => stats.failures += 1,
                Err(e) => {
                    stats.failures += 1;
                    log::error!(
                        "❌ Branch {:02}: {} not consolidated: {}",
                        self.branch.index,
                        name,
                        e
                    );
                }
            }
        }

        stats
    }

    /// Move one file into the processing folder and merge it into the ledger
    pub fn consolidate(&self, source: &Path, name: &str) -> Result<FileOutcome, IngestError> {
        let index = self.branch.index;
        self.ctx
            .audit
            .record(&format!("{:02}:::Starting file {}", index, name));
        let started = Local::now();

        log::debug!("Branch {:02}: waiting for ledger semaphore", index);
        let outcome = {
            let _guard = self.ctx.semaphore.acquire()?;
            self.merge_locked(source, name, started)?
        };
        log::debug!("Branch {:02}: ledger semaphore released", index);

        if let FileOutcome::Merged { .. } = outcome {
            self.ctx
                .load
                .pause(&format!("branch {:02} ({})", index, self.branch.code));
        }
        Ok(outcome)
    }

    fn merge_locked(
        &self,
        source: &Path,
        name: &str,
        started: chrono::DateTime<Local>,
    ) -> Result<FileOutcome, IngestError> {
        let index = self.branch.index;

        fs::create_dir_all(&self.branch.processing_dir)?;
        let moved = self.branch.processing_dir.join(name);
        if let Err(e) = fs::rename(source, &moved) {
            log::error!(
                "❌ Branch {:02}: cannot move {} to {}: {}",
                index,
                source.display(),
                moved.display(),
                e
            );
            return Ok(FileOutcome::MoveFailed);
        }

        let lines = split_lines(&fs::read(&moved)?);

        let (records, backend) = {
            // The semaphore already serializes writers; this lock only makes
            // the shared handle usable from several threads
            let mut ledger = self.ctx.ledger.lock().unwrap_or_else(|e| e.into_inner());
            let backend = ledger.backend_type();
            match ledger.append(&self.branch.code, &lines) {
                Ok(n) => (n, backend),
                Err(e @ LedgerError::CapacityExceeded { .. }) => {
                    log::error!(
                        "❌ Branch {:02}: {} ({} records) lost: {}. Raise SHARED_MEMORY_INITIAL_SIZE and reprocess {}",
                        index,
                        name,
                        lines.len(),
                        e,
                        moved.display()
                    );
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            }
        };

        log::info!("📥 Branch {:02}: {} merged", index, name);
        log::info!("   ├─ Records: {}", records);
        log::info!("   └─ Backend: {}", backend);

        let notified = match &self.ctx.notifier {
            Some(sender) => {
                let message = notification_text(backend, index, name, records);
                match sender.send(&message) {
                    Ok(sent) => sent,
                    Err(e) => {
                        log::warn!("⚠️  Branch {:02}: notification failed: {}", index, e);
                        false
                    }
                }
            }
            None => false,
        };

        let finished = Local::now();
        self.ctx.audit.record(&format!(
            "{:02}:::{}:::{}:::{}:::{}",
            index,
            started.format("%H:%M:%S"),
            finished.format("%H:%M:%S"),
            name,
            records
        ));

        Ok(FileOutcome::Merged { records, notified })
    }
}

/// Message sent to the Detector after a merge
pub fn notification_text(backend: &str, index: u32, file_name: &str, records: usize) -> String {
    let subject = if backend == "shared-memory" {
        "Shared memory"
    } else {
        "Ledger"
    };
    format!(
        "{} updated by branch {:02} ({}) with {} records",
        subject, index, file_name, records
    )
}
