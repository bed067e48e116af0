//! Run logging: timestamped lines mirrored to stdout and a log file.
//!
//! The per-epoch table is a parsing contract. Column order is fixed at
//! epoch, train time, test time, lr, train loss/acc, train-robust loss/acc,
//! test loss/acc, test-robust loss/acc; downstream tooling greps these rows.

use crate::train::StreamMetrics;
use crate::Result;
use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Header of the per-epoch table.
pub const EPOCH_HEADER: &str = "Epoch \t Train Time \t Test Time \t LR \t \t Train Loss \t Train Acc \t Train Robust Loss \t Train Robust Acc \t Test Loss \t Test Acc \t Test Robust Loss \t Test Robust Acc";

/// Line-per-event logger writing to stdout and a run log file.
pub struct RunLogger {
    file: File,
}

impl RunLogger {
    /// Open (and append to) the log file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| crate::Error::io(format!("opening log {}", path.display()), e))?;
        Ok(Self { file })
    }

    /// Log one timestamped message.
    pub fn info(&mut self, msg: &str) -> Result<()> {
        let line = format!("[{}] - {msg}", Local::now().format("%Y/%m/%d %H:%M:%S"));
        println!("{line}");
        writeln!(self.file, "{line}")
            .map_err(|e| crate::Error::io("writing log line".to_string(), e))
    }

    /// Emit the fixed column header of the per-epoch table.
    pub fn epoch_header(&mut self) -> Result<()> {
        self.info(EPOCH_HEADER)
    }

    /// Emit one per-epoch row. Times are in seconds.
    #[allow(clippy::too_many_arguments)]
    pub fn epoch_row(
        &mut self,
        epoch: usize,
        train_time: f64,
        test_time: f64,
        lr: f64,
        train: &StreamMetrics,
        train_robust: &StreamMetrics,
        test: &StreamMetrics,
        test_robust: &StreamMetrics,
    ) -> Result<()> {
        self.info(&format!(
            "{epoch} \t {train_time:.1} \t \t {test_time:.1} \t \t {lr:.4} \t {:.4} \t {:.4} \t {:.4} \t \t {:.4} \t \t {:.4} \t {:.4} \t {:.4} \t \t {:.4}",
            train.loss(),
            train.accuracy(),
            train_robust.loss(),
            train_robust.accuracy(),
            test.loss(),
            test.accuracy(),
            test_robust.loss(),
            test_robust.accuracy(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_info_lines_are_timestamped_and_mirrored_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.log");
        let mut logger = RunLogger::create(&path).unwrap();
        logger.info("hello").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("] - hello"));
        assert!(content.starts_with('['));
    }

    #[test]
    fn test_epoch_row_has_twelve_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.log");
        let mut logger = RunLogger::create(&path).unwrap();

        let mut m = StreamMetrics::new();
        m.record(1.5, 2, 4);
        logger.epoch_header().unwrap();
        logger.epoch_row(3, 12.3, 4.5, 0.01, &m, &m, &m, &m).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let row = content.lines().last().unwrap();
        let cols: Vec<&str> =
            row.split_once("] - ").unwrap().1.split('\t').map(str::trim).filter(|c| !c.is_empty()).collect();
        assert_eq!(cols.len(), 12);
        assert_eq!(cols[0], "3");
        assert_eq!(cols[3], "0.0100");
        assert_eq!(cols[4], "1.5000");
        assert_eq!(cols[5], "0.5000");
    }

    #[test]
    fn test_create_appends_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output.log");
        RunLogger::create(&path).unwrap().info("first").unwrap();
        RunLogger::create(&path).unwrap().info("second").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
