use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::error::SiteAdminError;

/// Notified once a container's files have been copied to their new root.
///
/// Implementations update whatever references the old location (search
/// indexes, metadata records). The call is fire-and-forget: failures are the
/// listener's to report.
pub trait FileMoveListener: Send + Sync {
    fn file_moved(&self, source: &Path, dest: &Path, user: &str, container: &str);
}

/// Reports moves to the application log only
pub struct LoggingMoveListener;

impl FileMoveListener for LoggingMoveListener {
    fn file_moved(&self, source: &Path, dest: &Path, user: &str, container: &str) {
        info!(
            "Files for container '{}' moved from '{}' to '{}' by '{}'",
            container,
            source.display(),
            dest.display(),
            user
        );
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub timestamp: String,
    pub container: String,
    pub user: String,
    pub source: PathBuf,
    pub dest: PathBuf,
}

/// Appends one JSON line per move to a record file
pub struct MoveRecordListener {
    path: PathBuf,
    lock: Mutex<()>,
}

impl MoveRecordListener {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append(&self, record: &MoveRecord) -> Result<(), SiteAdminError> {
        let line = serde_json::to_string(record)?;
        let _guard = self.lock.lock().unwrap();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SiteAdminError::at_path(&self.path, e))?;
        writeln!(file, "{}", line).map_err(|e| SiteAdminError::at_path(&self.path, e))
    }
}

impl FileMoveListener for MoveRecordListener {
    fn file_moved(&self, source: &Path, dest: &Path, user: &str, container: &str) {
        let record = MoveRecord {
            timestamp: Utc::now().to_rfc3339(),
            container: container.to_string(),
            user: user.to_string(),
            source: source.to_path_buf(),
            dest: dest.to_path_buf(),
        };
        if let Err(e) = self.append(&record) {
            error!("Failed to record file move for container '{}': {}", container, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_move_record_appends_json_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("moves.jsonl");
        let listener = MoveRecordListener::new(&path);

        listener.file_moved(Path::new("/old/a"), Path::new("/new/a"), "admin", "/home/a");
        listener.file_moved(Path::new("/old/b"), Path::new("/new/b"), "admin", "/home/b");

        let contents = fs::read_to_string(&path).unwrap();
        let records: Vec<MoveRecord> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].container, "/home/a");
        assert_eq!(records[1].source, PathBuf::from("/old/b"));
        assert_eq!(records[1].user, "admin");
    }

    #[test]
    fn test_unwritable_record_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be opened for append
        let listener = MoveRecordListener::new(dir.path());
        listener.file_moved(Path::new("/old"), Path::new("/new"), "admin", "/home");
    }
}
