//! Training Logger
//!
//! Records one row of metrics per epoch, both to a CSV file for later analysis
//! and to the `tracing` log for live progress.
//!
//! ## CSV Format
//!
//! - `epoch`: Completed epochs
//! - `iteration`: Total batches processed so far
//! - `elapsed_seconds`: Time since the logger was created
//! - `learning_rate`: Current learning rate
//! - `train_loss`: Mean training loss over the epoch
//! - `val_loss`: Mean validation loss
//! - `val_perplexity`: exp(val_loss)
//!
//! ## Perplexity
//!
//! For the full-softmax output layer, `exp(loss)` is the usual perplexity: a
//! uniform guess over a vocabulary of size V scores exactly V. For negative
//! sampling the loss is a sum of binary log-losses, so the column is only
//! useful for comparing runs with the same number of noise samples.
//!
//! ## Example
//!
//! ```rust,no_run
//! use skipgram::TrainingLogger;
//!
//! let mut logger = TrainingLogger::new("result/log.csv")?;
//! logger.log(1, 930, 0.001, 4.21, 4.35)?;
//! # Ok::<(), skipgram::Error>(())
//! ```

use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

/// Per-epoch metrics logger
pub struct TrainingLogger {
    log_file: File,
    start_time: Instant,
    last_log_time: Instant,
}

impl TrainingLogger {
    /// Create the CSV file and write its header
    pub fn new<P: AsRef<Path>>(log_path: P) -> Result<Self> {
        let mut log_file = File::create(log_path)?;
        writeln!(
            log_file,
            "epoch,iteration,elapsed_seconds,learning_rate,train_loss,val_loss,val_perplexity"
        )?;

        let now = Instant::now();
        Ok(Self {
            log_file,
            start_time: now,
            last_log_time: now,
        })
    }

    /// Continue an existing log, or start a new one if the file is missing
    ///
    /// Used when training resumes from a checkpoint so earlier epochs keep
    /// their rows.
    pub fn append<P: AsRef<Path>>(log_path: P) -> Result<Self> {
        let log_path = log_path.as_ref();
        if !log_path.exists() {
            return Self::new(log_path);
        }
        let log_file = OpenOptions::new().append(true).open(log_path)?;
        let now = Instant::now();
        Ok(Self {
            log_file,
            start_time: now,
            last_log_time: now,
        })
    }

    /// Append one row and report it
    pub fn log(
        &mut self,
        epoch: usize,
        iteration: usize,
        learning_rate: f32,
        train_loss: f32,
        val_loss: f32,
    ) -> Result<()> {
        let elapsed = self.start_time.elapsed().as_secs_f32();
        let val_perplexity = val_loss.exp();

        writeln!(
            self.log_file,
            "{},{},{:.2},{:.6},{:.4},{:.4},{:.2}",
            epoch, iteration, elapsed, learning_rate, train_loss, val_loss, val_perplexity
        )?;
        // Flush so a crashed run keeps its history
        self.log_file.flush()?;

        let epoch_time = self.last_log_time.elapsed().as_secs_f32();
        tracing::info!(
            "Epoch {:3} | Iter {:7} | Time: {:7.1}s (+{:.1}s) | LR: {:.6} | Train: {:.4} | Val: {:.4} | Perplexity: {:.2}",
            epoch,
            iteration,
            elapsed,
            epoch_time,
            learning_rate,
            train_loss,
            val_loss,
            val_perplexity
        );

        self.last_log_time = Instant::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");

        let mut logger = TrainingLogger::new(&path).unwrap();
        logger.log(1, 10, 0.001, 2.0, 2.5).unwrap();
        logger.log(2, 20, 0.001, 1.5, 2.25).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("epoch,iteration"));

        let fields: Vec<&str> = lines[2].split(',').collect();
        assert_eq!(fields[0], "2");
        assert_eq!(fields[1], "20");
        assert_eq!(fields[4], "1.5000");
        assert_eq!(fields[5], "2.2500");
        assert_eq!(fields[6], "9.49");
    }

    #[test]
    fn test_append_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");

        TrainingLogger::new(&path).unwrap().log(1, 10, 0.001, 2.0, 2.5).unwrap();
        TrainingLogger::append(&path).unwrap().log(2, 20, 0.001, 1.0, 2.0).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(text.lines().filter(|l| l.starts_with("epoch")).count(), 1);
    }

    #[test]
    fn test_append_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.csv");

        TrainingLogger::append(&path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("epoch,"));
    }
}
