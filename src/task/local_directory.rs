use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, error, info};

use super::job_log::JobLog;
use crate::error::SiteAdminError;

/// Per-job scratch directory holding the job log.
///
/// Cleanup runs exactly once: either through `finish`, which reports
/// failures, or on drop, which logs them. Cleanup copies the job log to the
/// preserve directory (when one is configured) and then removes the scratch
/// directory.
pub struct LocalDirectory {
    dir: PathBuf,
    job_log: JobLog,
    preserve_dir: Option<PathBuf>,
    released: bool,
}

impl LocalDirectory {
    pub fn create(
        work_dir: &Path,
        base_name: &str,
        preserve_dir: Option<PathBuf>,
    ) -> Result<Self, SiteAdminError> {
        fs::create_dir_all(work_dir).map_err(|e| SiteAdminError::at_path(work_dir, e))?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
        let base = format!("{}_{}", base_name, stamp);

        // Two jobs started within the same millisecond get distinct directories
        let mut attempt = 0;
        let (dir, name) = loop {
            let name = if attempt == 0 {
                base.clone()
            } else {
                format!("{}_{}", base, attempt)
            };
            let dir = work_dir.join(&name);
            match fs::create_dir(&dir) {
                Ok(()) => break (dir, name),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(SiteAdminError::at_path(&dir, e)),
            }
        };

        let job_log = JobLog::create(&dir.join(format!("{}.log", name)))?;
        debug!("Created job directory '{}'", dir.display());

        Ok(Self {
            dir,
            job_log,
            preserve_dir,
            released: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn job_log(&self) -> &JobLog {
        &self.job_log
    }

    /// Clean up now. Returns where the job log was preserved, if anywhere.
    pub fn finish(mut self) -> Result<Option<PathBuf>, SiteAdminError> {
        self.release()
    }

    fn release(&mut self) -> Result<Option<PathBuf>, SiteAdminError> {
        if self.released {
            return Ok(None);
        }
        self.released = true;

        let preserved = self.job_log.close().and_then(|()| self.preserve_log());

        // The scratch directory goes even when the log could not be saved
        let removed =
            fs::remove_dir_all(&self.dir).map_err(|e| SiteAdminError::at_path(&self.dir, e));
        if removed.is_ok() {
            debug!("Removed job directory '{}'", self.dir.display());
        }

        let preserved = preserved?;
        removed?;
        Ok(preserved)
    }

    fn preserve_log(&self) -> Result<Option<PathBuf>, SiteAdminError> {
        let Some(preserve_dir) = &self.preserve_dir else {
            return Ok(None);
        };

        fs::create_dir_all(preserve_dir).map_err(|e| SiteAdminError::at_path(preserve_dir, e))?;
        let log_path = self.job_log.path();
        let file_name = log_path.file_name().ok_or_else(|| {
            SiteAdminError::Error(format!(
                "Job log path '{}' has no file name",
                log_path.display()
            ))
        })?;
        let target = preserve_dir.join(file_name);
        fs::copy(log_path, &target).map_err(|e| SiteAdminError::at_path(&target, e))?;
        info!("Job log saved to '{}'", target.display());
        Ok(Some(target))
    }
}

impl Drop for LocalDirectory {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            error!(
                "Failed to clean up job directory '{}': {}",
                self.dir.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_finish_preserves_log_and_removes_dir() {
        let work = TempDir::new().unwrap();
        let keep = TempDir::new().unwrap();

        let local = LocalDirectory::create(
            work.path(),
            "copy_directory_fileroot_change",
            Some(keep.path().to_path_buf()),
        )
        .unwrap();
        let dir = local.path().to_path_buf();
        assert!(dir.is_dir());
        assert!(dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("copy_directory_fileroot_change_"));

        local.job_log().info("Job complete");
        let preserved = local.finish().unwrap().unwrap();

        assert!(!dir.exists());
        assert_eq!(preserved.parent().unwrap(), keep.path());
        assert!(fs::read_to_string(&preserved)
            .unwrap()
            .contains("Job complete"));
    }

    #[test]
    fn test_drop_cleans_up() {
        let work = TempDir::new().unwrap();
        let dir = {
            let local = LocalDirectory::create(work.path(), "job", None).unwrap();
            local.path().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_failed_preserve_still_removes_dir() {
        let work = TempDir::new().unwrap();
        let not_a_dir = work.path().join("jobs");
        fs::write(&not_a_dir, "occupied").unwrap();

        let local =
            LocalDirectory::create(&work.path().join("w"), "job", Some(not_a_dir.clone())).unwrap();
        let dir = local.path().to_path_buf();

        let err = local.finish().unwrap_err();
        assert!(matches!(err, SiteAdminError::PathIo { ref path, .. } if path == &not_a_dir));
        assert!(!dir.exists());
    }

    #[test]
    fn test_same_base_name_gets_distinct_dirs() {
        let work = TempDir::new().unwrap();
        let first = LocalDirectory::create(work.path(), "job", None).unwrap();
        let second = LocalDirectory::create(work.path(), "job", None).unwrap();
        assert_ne!(first.path(), second.path());
        assert!(first.finish().unwrap().is_none());
        assert!(second.finish().unwrap().is_none());
    }
}
