use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::model::domain::fit_history::EpochMetrics;
use crate::model::domain::model_error::ModelError;

const HEADER: &str = "epoch,acc,loss,val_acc,val_loss";

/// Per-epoch CSV log of training metrics.
pub struct CsvEpochLog {
    path: PathBuf,
    file: File,
}

impl CsvEpochLog {
    /// Open the log, truncating it unless `append` is set.
    ///
    /// The header is written whenever the file starts out empty.
    pub fn open(path: &Path, append: bool) -> Result<Self, ModelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ModelError::io(parent, e))?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let mut file = options.open(path).map_err(|e| ModelError::io(path, e))?;

        let len = file
            .metadata()
            .map_err(|e| ModelError::io(path, e))?
            .len();
        if len == 0 {
            writeln!(file, "{HEADER}").map_err(|e| ModelError::io(path, e))?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn append(&mut self, epoch: usize, metrics: &EpochMetrics) -> Result<(), ModelError> {
        writeln!(
            self.file,
            "{epoch},{:.6},{:.6},{:.6},{:.6}",
            metrics.acc, metrics.loss, metrics.val_acc, metrics.val_loss
        )
        .map_err(|e| ModelError::io(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> EpochMetrics {
        EpochMetrics {
            loss: 0.5,
            acc: 0.75,
            val_loss: 0.25,
            val_acc: 1.0,
        }
    }

    #[test]
    fn test_fresh_log_has_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("training.log");
        let mut log = CsvEpochLog::open(&path, false).unwrap();
        log.append(0, &metrics()).unwrap();
        drop(log);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[1], "0,0.750000,0.500000,1.000000,0.250000");
    }

    #[test]
    fn test_truncates_unless_appending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training.log");

        let mut log = CsvEpochLog::open(&path, false).unwrap();
        log.append(0, &metrics()).unwrap();
        drop(log);
        let mut log = CsvEpochLog::open(&path, true).unwrap();
        log.append(1, &metrics()).unwrap();
        drop(log);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);

        let log = CsvEpochLog::open(&path, false).unwrap();
        drop(log);
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }
}
