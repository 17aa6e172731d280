use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, trace, Level};
use logging_timer::timer;

use super::listener::FileMoveListener;
use super::plan::MigrateFilesOption;
use crate::config::MigrationConfig;
use crate::error::SiteAdminError;
use crate::task::{JobLog, TaskProgress};

/// Tunables for a copy pass
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationSettings {
    pub progress_interval: Duration,
    pub skip_unchanged: bool,
}

impl MigrationSettings {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            progress_interval: config.progress_interval(),
            skip_unchanged: config.skip_unchanged(),
        }
    }
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self::from_config(&MigrationConfig::default())
    }
}

/// File and byte totals for a directory tree
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct CopyStats {
    pub files: u64,
    pub bytes: u64,
}

/// Copies (and optionally moves) one directory tree to a new root.
pub struct DirectoryMigrator<'a> {
    source_root: PathBuf,
    dest_root: PathBuf,
    option: MigrateFilesOption,
    settings: MigrationSettings,
    job_log: &'a JobLog,
    progress: &'a TaskProgress,
    interrupt_token: &'a AtomicBool,
    totals: CopyStats,
    remaining: CopyStats,
    last_progress_log: Instant,
}

impl<'a> DirectoryMigrator<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source_root: &Path,
        dest_root: &Path,
        option: MigrateFilesOption,
        settings: MigrationSettings,
        job_log: &'a JobLog,
        progress: &'a TaskProgress,
        interrupt_token: &'a AtomicBool,
        job_start: Instant,
    ) -> Self {
        Self {
            source_root: source_root.to_path_buf(),
            dest_root: dest_root.to_path_buf(),
            option,
            settings,
            job_log,
            progress,
            interrupt_token,
            totals: CopyStats::default(),
            remaining: CopyStats::default(),
            last_progress_log: job_start,
        }
    }

    /// Validate, count, copy, notify and (for a move) delete the source.
    pub fn run(
        &mut self,
        user: &str,
        container: &str,
        listener: Option<&dyn FileMoveListener>,
    ) -> Result<CopyStats, SiteAdminError> {
        self.validate()?;

        self.progress.set_status_message("Getting stats");
        let stats = Self::precount(&self.source_root)?;
        self.totals = stats;
        self.remaining = stats;
        self.job_log.info(&format!(
            "Source directory has {} files ({} total bytes)",
            stats.files, stats.bytes
        ));
        self.progress.set_progress_total(stats.files, 0, Some("files"));

        self.progress.set_status_message("Copying files");
        let (source_root, dest_root) = (self.source_root.clone(), self.dest_root.clone());
        self.copy_tree(&source_root, &dest_root)?;
        self.job_log.info("Done copying");

        match listener {
            Some(listener) => {
                self.job_log.info("Informing file listeners of copy/move");
                listener.file_moved(&source_root, &dest_root, user, container);
            }
            None => self
                .job_log
                .warn("No file move listener registered; skipping notification"),
        }

        if self.option == MigrateFilesOption::Move {
            self.progress.set_status_message("Deleting files");
            self.job_log.info("Deleting source directory");
            self.delete_tree(&source_root)?;
            self.job_log.info("Done deleting source directory");
        }

        Ok(stats)
    }

    /// The source must be an existing directory. The destination may be
    /// missing but may not be a file, the source itself, or inside the source.
    pub fn validate(&self) -> Result<(), SiteAdminError> {
        if !self.source_root.is_dir() {
            return Err(SiteAdminError::Validation(format!(
                "Source '{}' does not exist or is not a directory",
                self.source_root.display()
            )));
        }

        if self.dest_root.exists() && !self.dest_root.is_dir() {
            return Err(SiteAdminError::Validation(format!(
                "Destination '{}' is not a directory",
                self.dest_root.display()
            )));
        }

        let source = dunce::canonicalize(&self.source_root)
            .map_err(|e| SiteAdminError::at_path(&self.source_root, e))?;
        if let Some(dest) = Self::nearest_existing(&self.dest_root)? {
            if dest.starts_with(&source) {
                return Err(SiteAdminError::Validation(format!(
                    "Destination '{}' is the source '{}' or inside it",
                    self.dest_root.display(),
                    self.source_root.display()
                )));
            }
        }

        Ok(())
    }

    /// Canonical form of `path` or of its closest existing ancestor
    fn nearest_existing(path: &Path) -> Result<Option<PathBuf>, SiteAdminError> {
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() || !ancestor.exists() {
                continue;
            }
            return dunce::canonicalize(ancestor)
                .map(Some)
                .map_err(|e| SiteAdminError::at_path(ancestor, e));
        }
        Ok(None)
    }

    /// Count regular files and their total size under `dir`
    pub fn precount(dir: &Path) -> Result<CopyStats, SiteAdminError> {
        let _tmr = timer!(Level::Trace; "DirectoryMigrator::precount", "{}", dir.display());

        let mut stats = CopyStats::default();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            let entries =
                fs::read_dir(&current).map_err(|e| SiteAdminError::at_path(&current, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| SiteAdminError::at_path(&current, e))?;
                let path = entry.path();
                let metadata = fs::metadata(&path).map_err(|e| SiteAdminError::at_path(&path, e))?;
                if metadata.is_dir() {
                    pending.push(path);
                } else if metadata.is_file() {
                    stats.files += 1;
                    stats.bytes += metadata.len();
                }
            }
        }

        Ok(stats)
    }

    /// Recursively copy `source_dir` into `dest_dir`, replacing existing files
    pub fn copy_tree(&mut self, source_dir: &Path, dest_dir: &Path) -> Result<(), SiteAdminError> {
        let _tmr = timer!(Level::Trace; "DirectoryMigrator::copy_tree", "{}", source_dir.display());

        if !dest_dir.exists() {
            fs::create_dir_all(dest_dir).map_err(|e| SiteAdminError::at_path(dest_dir, e))?;
        }
        debug!(
            "Copying directory '{}' to '{}'",
            source_dir.display(),
            dest_dir.display()
        );

        let entries =
            fs::read_dir(source_dir).map_err(|e| SiteAdminError::at_path(source_dir, e))?;
        for entry in entries {
            self.check_interrupted()?;

            let entry = entry.map_err(|e| SiteAdminError::at_path(source_dir, e))?;
            let source_path = entry.path();
            let dest_path = dest_dir.join(entry.file_name());
            let metadata = fs::metadata(&source_path)
                .map_err(|e| SiteAdminError::at_path(&source_path, e))?;

            if metadata.is_dir() {
                self.copy_tree(&source_path, &dest_path)?;
            } else if metadata.is_file() {
                self.copy_file(&source_path, &dest_path, &metadata)?;
            } else {
                debug!("Skipping special file '{}'", source_path.display());
            }
        }

        Ok(())
    }

    /// Recursively delete `dir`. Entries that vanish along the way are ignored
    /// and symbolic links are removed without being followed.
    pub fn delete_tree(&self, dir: &Path) -> Result<(), SiteAdminError> {
        let _tmr = timer!(Level::Trace; "DirectoryMigrator::delete_tree", "{}", dir.display());

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(SiteAdminError::at_path(dir, e)),
        };

        for entry in entries {
            self.check_interrupted()?;

            let entry = entry.map_err(|e| SiteAdminError::at_path(dir, e))?;
            let path = entry.path();
            let file_type = entry
                .file_type()
                .map_err(|e| SiteAdminError::at_path(&path, e))?;

            if file_type.is_dir() {
                self.delete_tree(&path)?;
            } else {
                match fs::remove_file(&path) {
                    Ok(()) => trace!("Deleted '{}'", path.display()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(SiteAdminError::at_path(&path, e)),
                }
            }
        }

        match fs::remove_dir(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SiteAdminError::at_path(dir, e)),
        }
    }

    pub fn totals(&self) -> CopyStats {
        self.totals
    }

    pub fn remaining(&self) -> CopyStats {
        self.remaining
    }

    /// "N out of M files copied (B out of T bytes)"
    pub fn progress_message(&self) -> String {
        format!(
            "{} out of {} files copied ({} out of {} bytes)",
            self.totals.files.saturating_sub(self.remaining.files),
            self.totals.files,
            self.totals.bytes.saturating_sub(self.remaining.bytes),
            self.totals.bytes
        )
    }

    fn copy_file(
        &mut self,
        source: &Path,
        dest: &Path,
        source_meta: &Metadata,
    ) -> Result<(), SiteAdminError> {
        if self.settings.skip_unchanged && Self::is_unchanged(source_meta, dest) {
            self.job_log
                .info(&format!("Retained existing file '{}'", dest.display()));
        } else {
            fs::copy(source, dest).map_err(|e| SiteAdminError::at_path(dest, e))?;
            Self::preserve_modified(source_meta, dest)?;
            trace!("Copied '{}' to '{}'", source.display(), dest.display());
        }

        self.remaining.files = self.remaining.files.saturating_sub(1);
        self.remaining.bytes = self.remaining.bytes.saturating_sub(source_meta.len());
        self.progress.advance_progress(1);
        self.log_progress_if_due();

        Ok(())
    }

    fn is_unchanged(source_meta: &Metadata, dest: &Path) -> bool {
        let Ok(dest_meta) = fs::metadata(dest) else {
            return false;
        };
        if !dest_meta.is_file() || dest_meta.len() != source_meta.len() {
            return false;
        }
        match (source_meta.modified(), dest_meta.modified()) {
            (Ok(source_time), Ok(dest_time)) => source_time == dest_time,
            _ => false,
        }
    }

    fn preserve_modified(source_meta: &Metadata, dest: &Path) -> Result<(), SiteAdminError> {
        let modified = source_meta
            .modified()
            .map_err(|e| SiteAdminError::at_path(dest, e))?;
        let file = File::options()
            .write(true)
            .open(dest)
            .map_err(|e| SiteAdminError::at_path(dest, e))?;
        file.set_modified(modified)
            .map_err(|e| SiteAdminError::at_path(dest, e))
    }

    fn log_progress_if_due(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.last_progress_log) > self.settings.progress_interval {
            self.job_log.info(&self.progress_message());
            self.last_progress_log = now;
        }
    }

    fn check_interrupted(&self) -> Result<(), SiteAdminError> {
        if self.interrupt_token.load(Ordering::Acquire) {
            Err(SiteAdminError::TaskInterrupted)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskType;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use std::time::SystemTime;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        source: PathBuf,
        dest: PathBuf,
        job_log: JobLog,
        progress: Arc<TaskProgress>,
        interrupt: AtomicBool,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let source = tmp.path().join("old");
            let dest = tmp.path().join("new");
            fs::create_dir_all(source.join("a/b")).unwrap();
            fs::create_dir_all(source.join("empty")).unwrap();
            fs::write(source.join("top.txt"), "12345").unwrap();
            fs::write(source.join("a/one.txt"), "1").unwrap();
            fs::write(source.join("a/b/two.bin"), vec![7u8; 1024]).unwrap();

            let job_log = JobLog::create(&tmp.path().join("job.log")).unwrap();
            Self {
                _tmp: tmp,
                source,
                dest,
                job_log,
                progress: TaskProgress::new(TaskType::CopyFileRoot, "Copying", "test"),
                interrupt: AtomicBool::new(false),
            }
        }

        fn migrator(&self, option: MigrateFilesOption, settings: MigrationSettings) -> DirectoryMigrator<'_> {
            DirectoryMigrator::new(
                &self.source,
                &self.dest,
                option,
                settings,
                &self.job_log,
                &self.progress,
                &self.interrupt,
                Instant::now(),
            )
        }

        fn log_text(&self) -> String {
            fs::read_to_string(self.job_log.path()).unwrap()
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        calls: Mutex<Vec<(PathBuf, PathBuf, String, String)>>,
    }

    impl FileMoveListener for RecordingListener {
        fn file_moved(&self, source: &Path, dest: &Path, user: &str, container: &str) {
            self.calls.lock().unwrap().push((
                source.to_path_buf(),
                dest.to_path_buf(),
                user.to_string(),
                container.to_string(),
            ));
        }
    }

    #[test]
    fn test_precount_counts_files_and_bytes() {
        let fx = Fixture::new();
        let stats = DirectoryMigrator::precount(&fx.source).unwrap();
        assert_eq!(stats, CopyStats { files: 3, bytes: 1030 });
    }

    #[test]
    fn test_copy_reproduces_tree() {
        let fx = Fixture::new();
        let mut migrator = fx.migrator(MigrateFilesOption::Copy, MigrationSettings::default());
        let stats = migrator.run("admin", "/home/p", None).unwrap();

        assert_eq!(stats.files, 3);
        assert_eq!(fs::read_to_string(fx.dest.join("top.txt")).unwrap(), "12345");
        assert_eq!(fs::read_to_string(fx.dest.join("a/one.txt")).unwrap(), "1");
        assert_eq!(fs::read(fx.dest.join("a/b/two.bin")).unwrap().len(), 1024);
        assert!(fx.dest.join("empty").is_dir());

        // Copy leaves the source alone
        assert!(fx.source.join("a/b/two.bin").exists());
        assert_eq!(migrator.remaining(), CopyStats::default());
        assert_eq!(
            migrator.progress_message(),
            "3 out of 3 files copied (1030 out of 1030 bytes)"
        );

        let log = fx.log_text();
        assert!(log.contains("Source directory has 3 files (1030 total bytes)"));
        assert!(log.contains("No file move listener registered"));
    }

    #[test]
    fn test_copy_replaces_existing_and_keeps_extras() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.dest.join("a")).unwrap();
        fs::write(fx.dest.join("a/one.txt"), "stale contents").unwrap();
        fs::write(fx.dest.join("extra.txt"), "keep me").unwrap();

        let mut migrator = fx.migrator(MigrateFilesOption::Copy, MigrationSettings::default());
        migrator.run("admin", "/home/p", None).unwrap();

        assert_eq!(fs::read_to_string(fx.dest.join("a/one.txt")).unwrap(), "1");
        assert_eq!(fs::read_to_string(fx.dest.join("extra.txt")).unwrap(), "keep me");
    }

    #[test]
    fn test_rerun_gives_same_tree() {
        let fx = Fixture::new();
        fx.migrator(MigrateFilesOption::Copy, MigrationSettings::default())
            .run("admin", "/home/p", None)
            .unwrap();
        let stats = fx
            .migrator(MigrateFilesOption::Copy, MigrationSettings::default())
            .run("admin", "/home/p", None)
            .unwrap();

        assert_eq!(stats, CopyStats { files: 3, bytes: 1030 });
        assert_eq!(DirectoryMigrator::precount(&fx.dest).unwrap(), stats);
        assert_eq!(fs::read_to_string(fx.dest.join("top.txt")).unwrap(), "12345");
    }

    #[test]
    fn test_copy_preserves_modified_time() {
        let fx = Fixture::new();
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_500_000_000);
        File::options()
            .write(true)
            .open(fx.source.join("top.txt"))
            .unwrap()
            .set_modified(old)
            .unwrap();

        let mut migrator = fx.migrator(MigrateFilesOption::Copy, MigrationSettings::default());
        migrator.run("admin", "/home/p", None).unwrap();

        let copied = fs::metadata(fx.dest.join("top.txt")).unwrap();
        assert_eq!(copied.modified().unwrap(), old);
    }

    #[test]
    fn test_skip_unchanged_retains_matching_file() {
        let fx = Fixture::new();
        let settings = MigrationSettings {
            skip_unchanged: true,
            ..MigrationSettings::default()
        };

        fx.migrator(MigrateFilesOption::Copy, settings.clone())
            .run("admin", "/home/p", None)
            .unwrap();
        fx.migrator(MigrateFilesOption::Copy, settings)
            .run("admin", "/home/p", None)
            .unwrap();

        let log = fx.log_text();
        assert_eq!(log.matches("Retained existing file").count(), 3);
    }

    #[test]
    fn test_move_deletes_source_and_notifies_listener() {
        let fx = Fixture::new();
        let listener = RecordingListener::default();

        let mut migrator = fx.migrator(MigrateFilesOption::Move, MigrationSettings::default());
        migrator.run("admin", "/home/p", Some(&listener)).unwrap();

        assert!(!fx.source.exists());
        assert_eq!(fs::read_to_string(fx.dest.join("top.txt")).unwrap(), "12345");

        let calls = listener.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![(fx.source.clone(), fx.dest.clone(), "admin".to_string(), "/home/p".to_string())]
        );
        assert!(fx.log_text().contains("Done deleting source directory"));
    }

    #[test]
    fn test_missing_source_fails_validation() {
        let fx = Fixture::new();
        fs::remove_dir_all(&fx.source).unwrap();
        let mut migrator = fx.migrator(MigrateFilesOption::Move, MigrationSettings::default());
        assert!(matches!(
            migrator.run("admin", "/home/p", None),
            Err(SiteAdminError::Validation(_))
        ));
        assert!(!fx.dest.exists());
    }

    #[test]
    fn test_destination_file_fails_validation() {
        let fx = Fixture::new();
        fs::write(&fx.dest, "not a dir").unwrap();
        let migrator = fx.migrator(MigrateFilesOption::Copy, MigrationSettings::default());
        assert!(matches!(migrator.validate(), Err(SiteAdminError::Validation(_))));
    }

    #[test]
    fn test_destination_with_missing_parents_is_created() {
        let fx = Fixture::new();
        let dest = fx.dest.join("deeper/still");
        let mut migrator = DirectoryMigrator::new(
            &fx.source,
            &dest,
            MigrateFilesOption::Copy,
            MigrationSettings::default(),
            &fx.job_log,
            &fx.progress,
            &fx.interrupt,
            Instant::now(),
        );
        migrator.run("admin", "/home/p", None).unwrap();
        assert!(dest.join("a/b/two.bin").is_file());
    }

    #[test]
    fn test_same_directory_fails_validation() {
        let fx = Fixture::new();
        let migrator = DirectoryMigrator::new(
            &fx.source,
            &fx.source,
            MigrateFilesOption::Move,
            MigrationSettings::default(),
            &fx.job_log,
            &fx.progress,
            &fx.interrupt,
            Instant::now(),
        );
        assert!(matches!(migrator.validate(), Err(SiteAdminError::Validation(_))));
    }

    #[test]
    fn test_destination_inside_source_fails_validation() {
        let fx = Fixture::new();
        let migrator = DirectoryMigrator::new(
            &fx.source,
            &fx.source.join("a/nested"),
            MigrateFilesOption::Copy,
            MigrationSettings::default(),
            &fx.job_log,
            &fx.progress,
            &fx.interrupt,
            Instant::now(),
        );
        assert!(matches!(migrator.validate(), Err(SiteAdminError::Validation(_))));
    }

    #[test]
    fn test_interrupt_stops_copy() {
        let fx = Fixture::new();
        fx.interrupt.store(true, Ordering::Release);
        let mut migrator = fx.migrator(MigrateFilesOption::Move, MigrationSettings::default());

        assert!(matches!(
            migrator.run("admin", "/home/p", None),
            Err(SiteAdminError::TaskInterrupted)
        ));
        // Nothing deleted from the source
        assert!(fx.source.join("top.txt").exists());
    }

    #[test]
    fn test_progress_logged_at_interval() {
        let fx = Fixture::new();
        let settings = MigrationSettings {
            progress_interval: Duration::ZERO,
            ..MigrationSettings::default()
        };
        fx.migrator(MigrateFilesOption::Copy, settings)
            .run("admin", "/home/p", None)
            .unwrap();

        let log = fx.log_text();
        assert!(log.contains("out of 3 files copied"));
        assert!(log.contains("3 out of 3 files copied (1030 out of 1030 bytes)"));
    }

    #[test]
    fn test_delete_tree_tolerates_missing_dir() {
        let fx = Fixture::new();
        let migrator = fx.migrator(MigrateFilesOption::Move, MigrationSettings::default());
        migrator.delete_tree(&fx.dest.join("never-created")).unwrap();
    }

    #[test]
    fn test_snapshot_tracks_files() {
        let fx = Fixture::new();
        fx.migrator(MigrateFilesOption::Copy, MigrationSettings::default())
            .run("admin", "/home/p", None)
            .unwrap();

        let snapshot = fx.progress.get_snapshot();
        assert_eq!(snapshot.status_message.as_deref(), Some("Copying files"));
        assert_eq!(snapshot.progress_bar.unwrap().message, "3 / 3 files");
    }
}
