//! Per-pattern result files

use super::engine::PassReport;
use super::rule::PatternRule;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ResultWriter {
    path: PathBuf,
}

impl ResultWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the previous pass's results, if any
    pub fn reset(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Replace the file with one line per flagged key.
    ///
    /// Returns the lines written so the caller can log them.
    pub fn write_report(&self, rule: &PatternRule, report: &PassReport) -> io::Result<Vec<String>> {
        self.reset()?;

        let lines: Vec<String> = report
            .hits
            .iter()
            .map(|hit| rule.format_hit(&hit.key, &hit.aggregate))
            .collect();
        if lines.is_empty() {
            return Ok(lines);
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for line in &lines {
            writeln!(writer, "{}", line)?;
        }
        writer.flush()?;
        Ok(lines)
    }
}
