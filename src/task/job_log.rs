use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use log::{error, info, warn};

use crate::error::SiteAdminError;

/// Plain-text, timestamped log for a single job.
///
/// Every line is mirrored to the application log. Once closed, further lines
/// only reach the application log.
pub struct JobLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl JobLog {
    pub fn create(path: &Path) -> Result<Self, SiteAdminError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SiteAdminError::at_path(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: &str) {
        info!("{}", message);
        self.write_line("INFO", message);
    }

    pub fn warn(&self, message: &str) {
        warn!("{}", message);
        self.write_line("WARN", message);
    }

    /// Record an error together with its cause
    pub fn error(&self, message: &str, err: &SiteAdminError) {
        let line = format!("{}: {}", message, err);
        error!("{}", line);
        self.write_line("ERROR", &line);
    }

    /// Flush and release the file handle
    pub fn close(&self) -> Result<(), SiteAdminError> {
        if let Some(mut file) = self.file.lock().unwrap().take() {
            file.flush().map_err(|e| SiteAdminError::at_path(&self.path, e))?;
        }
        Ok(())
    }

    fn write_line(&self, level: &str, message: &str) {
        let mut guard = self.file.lock().unwrap();
        let Some(file) = guard.as_mut() else {
            return;
        };

        let timestamp = Local::now().format("%d %b %Y %H:%M:%S,%3f");
        if let Err(e) = writeln!(file, "{} {:<5} {}", timestamp, level, message) {
            // The application log still has the line
            warn!("Unable to write to job log '{}': {}", self.path.display(), e);
        }
    }
}
