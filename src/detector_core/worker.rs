//! Pattern worker threads and the notification loop that wakes them
//!
//! Each worker is BLOCKED on its gate until a notification arrives, then
//! RUNNING one pass with the ledger semaphore held:
//! read ledger → evaluate rule → rewrite result file and log hits.
//! The semaphore is released before the simulated-load pause.

use super::engine::{run_pass, PassReport};
use super::results::ResultWriter;
use super::rule::PatternRule;
use super::summary::{PassSummary, PassSummaryWriter};
use super::DetectError;
use crate::config::DataLayout;
use crate::delay::SimulatedLoad;
use crate::ipc::{ActivationGate, GateBank, IpcError, NamedSemaphore, NotificationReceiver};
use crate::ledger::LedgerReader;
use crate::logging::AuditLog;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Everything the pattern workers share
pub struct DetectorContext {
    pub semaphore: Arc<NamedSemaphore>,
    pub reader: LedgerReader,
    pub layout: DataLayout,
    pub audit: Arc<AuditLog>,
    pub load: SimulatedLoad,
    pub summary: Option<Arc<PassSummaryWriter>>,
}

pub struct PatternWorker {
    rule: PatternRule,
    gate: Arc<ActivationGate>,
    results: ResultWriter,
    ctx: Arc<DetectorContext>,
}

impl PatternWorker {
    pub fn new(rule: PatternRule, gate: Arc<ActivationGate>, ctx: Arc<DetectorContext>) -> Self {
        let results = ResultWriter::new(ctx.layout.result_path(rule.id));
        Self {
            rule,
            gate,
            results,
            ctx,
        }
    }

    pub fn rule(&self) -> &PatternRule {
        &self.rule
    }

    /// Wait for activation, run a pass, repeat
    pub fn run(&self) {
        log::info!("🔎 Pattern {:02} ready: {}", self.rule.id, self.rule.description);
        loop {
            self.gate.wait();
            if let Err(e) = self.run_once() {
                log::error!("❌ Pattern {:02}: pass aborted: {}", self.rule.id, e);
            }
        }
    }

    /// One complete pass, including the simulated-load pause
    pub fn run_once(&self) -> Result<PassReport, DetectError> {
        let id = self.rule.id;

        let report = {
            log::debug!("Pattern {:02}: waiting for ledger semaphore", id);
            let _guard = self.ctx.semaphore.acquire()?;
            let lines = self.ctx.reader.read_all()?;
            let report = run_pass(&self.rule, &lines);

            let hits = self.results.write_report(&self.rule, &report)?;
            for hit in &hits {
                self.ctx.audit.record(hit);
            }
            report
        };

        log::info!("🔎 Pattern {:02} pass complete", id);
        log::info!("   ├─ Records: {} ({} skipped)", report.scanned, report.skipped);
        log::info!("   ├─ Keys: {}", report.keys);
        log::info!("   └─ Flagged: {}", report.hits.len());

        if let Some(summary) = &self.ctx.summary {
            if let Err(e) = summary.write_summary(&PassSummary::from_report(&self.rule, &report)) {
                log::warn!("⚠️  Pattern {:02}: pass summary not written: {}", id, e);
            }
        }

        self.ctx.load.pause(&format!("pattern {:02}", id));
        Ok(report)
    }
}

/// Spawn one named thread per rule, each bound to its own gate
pub fn spawn_pattern_workers(
    rules: Vec<PatternRule>,
    gates: &GateBank,
    ctx: Arc<DetectorContext>,
) -> io::Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(rules.len());

    for (i, rule) in rules.into_iter().enumerate() {
        let gate = gates.gate(i).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "fewer gates than pattern rules")
        })?;
        let id = rule.id;
        let worker = PatternWorker::new(rule, gate, Arc::clone(&ctx));
        let handle = thread::Builder::new()
            .name(format!("pattern-{:02}", id))
            .spawn(move || worker.run())?;
        handles.push(handle);
    }

    log::info!("🧵 {} pattern workers running", handles.len());
    Ok(handles)
}

/// Release every gate on each notification. Returns only on a pipe error.
pub fn listen_for_notifications(
    mut receiver: NotificationReceiver,
    gates: &GateBank,
    audit: &AuditLog,
) -> Result<(), IpcError> {
    log::info!("📡 Listening for notifications on {}", receiver.path().display());
    loop {
        let message = receiver.recv()?;
        audit.record(&format!("Notification received: {}", message));
        gates.release_all();
    }
}
