//! JSONL pass summaries - one object per completed pattern pass

use super::engine::PassReport;
use super::rule::PatternRule;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub pattern_id: u8,
    pub description: String,
    pub scanned: usize,
    pub skipped: usize,
    pub keys: usize,
    pub flagged: usize,
    pub timestamp: i64,
}

impl PassSummary {
    pub fn from_report(rule: &PatternRule, report: &PassReport) -> Self {
        Self {
            pattern_id: rule.id,
            description: rule.description.to_string(),
            scanned: report.scanned,
            skipped: report.skipped,
            keys: report.keys,
            flagged: report.hits.len(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Shared by every pattern thread
#[derive(Debug)]
pub struct PassSummaryWriter {
    path: PathBuf,
    file: Mutex<File>,
}

impl PassSummaryWriter {
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        log::info!("📝 Writing pass summaries to: {}", path.display());
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_summary(&self, summary: &PassSummary) -> std::io::Result<()> {
        let json = serde_json::to_string(summary)?;
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(file, "{}", json)?;
        file.flush()
    }
}
