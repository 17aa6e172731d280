use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::config::MigrationConfig;
use crate::error::SiteAdminError;
use crate::fileroot::{
    CopyPlan, DirectoryMigrator, FileMoveListener, FolderCopy, MigrateFilesOption,
    MigrationSettings,
};

use super::job_log::JobLog;
use super::local_directory::LocalDirectory;
use super::progress::TaskProgress;
use super::task_type::TaskType;
use super::traits::Task;

// ============================================================================
// CopyFileRootSettings
// ============================================================================

/// Where a copy job keeps its scratch files and how it copies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyFileRootSettings {
    pub work_dir: PathBuf,
    pub job_log_dir: Option<PathBuf>,
    pub progress_interval_secs: u64,
    pub skip_unchanged: bool,
}

impl CopyFileRootSettings {
    pub fn from_config(config: &MigrationConfig, default_log_dir: Option<PathBuf>) -> Self {
        Self {
            work_dir: config.work_dir(),
            job_log_dir: config.job_log_dir().or(default_log_dir),
            progress_interval_secs: config.progress_interval().as_secs(),
            skip_unchanged: config.skip_unchanged(),
        }
    }

    fn migration_settings(&self) -> MigrationSettings {
        MigrationSettings {
            progress_interval: Duration::from_secs(self.progress_interval_secs),
            skip_unchanged: self.skip_unchanged,
        }
    }

    pub fn to_json(&self) -> Result<String, SiteAdminError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// CopyFileRootTask
// ============================================================================

/// Copies (or moves) every folder of a `CopyPlan` to its new file root.
///
/// Folders are processed in order. A folder that fails is logged and the job
/// carries on with the next one; the job ends in error if any folder failed.
/// An interrupt stops the job at once.
pub struct CopyFileRootTask {
    plan: CopyPlan,
    settings: CopyFileRootSettings,
    listener: Option<Box<dyn FileMoveListener>>,
    failed_folders: Vec<String>,
    preserved_log: Option<PathBuf>,
}

impl CopyFileRootTask {
    pub fn new(
        plan: CopyPlan,
        settings: CopyFileRootSettings,
        listener: Option<Box<dyn FileMoveListener>>,
    ) -> Self {
        Self {
            plan,
            settings,
            listener,
            failed_folders: Vec::new(),
            preserved_log: None,
        }
    }

    /// Containers whose folder failed in the last run
    pub fn failed_folders(&self) -> &[String] {
        &self.failed_folders
    }

    /// Where the last run's job log was saved
    pub fn preserved_log(&self) -> Option<&PathBuf> {
        self.preserved_log.as_ref()
    }

    fn run_job(
        &mut self,
        job_log: &JobLog,
        progress: &TaskProgress,
        interrupt_token: &AtomicBool,
        start: Instant,
    ) -> Result<(), SiteAdminError> {
        job_log.info(&format!("{} job started", TaskType::CopyFileRoot));
        job_log.info(&format!(
            "Migration option: {}",
            self.plan.option.description()
        ));
        job_log.info(&format!(
            "Containers:\n\t{}",
            self.plan.containers().join(",\n\t")
        ));

        self.failed_folders.clear();
        for folder in &self.plan.folders {
            match self.copy_folder(folder, job_log, progress, interrupt_token, start) {
                Ok(()) => progress.add_breadcrumb(&format!("Copied {}", folder.container)),
                Err(SiteAdminError::TaskInterrupted) => {
                    job_log.warn("Job stopped on request");
                    return Err(SiteAdminError::TaskInterrupted);
                }
                Err(e) => {
                    job_log.error(
                        &format!("Error processing container '{}'", folder.container),
                        &e,
                    );
                    self.failed_folders.push(folder.container.clone());
                }
            }
        }

        job_log.info(&format!(
            "Elapsed time {} seconds",
            start.elapsed().as_secs()
        ));
        job_log.info("Job complete");

        if self.failed_folders.is_empty() {
            Ok(())
        } else {
            Err(SiteAdminError::Error(format!(
                "{} of {} folders failed: {}",
                self.failed_folders.len(),
                self.plan.folders.len(),
                self.failed_folders.join(", ")
            )))
        }
    }

    fn copy_folder(
        &self,
        folder: &FolderCopy,
        job_log: &JobLog,
        progress: &TaskProgress,
        interrupt_token: &AtomicBool,
        start: Instant,
    ) -> Result<(), SiteAdminError> {
        job_log.info(&format!("Container: {}", folder.container));
        job_log.info(&format!("Source: {}", folder.source.display()));
        job_log.info(&format!("Destination: {}", folder.dest.display()));

        let mut migrator = DirectoryMigrator::new(
            &folder.source,
            &folder.dest,
            self.plan.option,
            self.settings.migration_settings(),
            job_log,
            progress,
            interrupt_token,
            start,
        );
        migrator.run(&self.plan.user, &folder.container, self.listener.as_deref())?;
        job_log.info(&migrator.progress_message());
        Ok(())
    }
}

impl Task for CopyFileRootTask {
    fn run(
        &mut self,
        progress: Arc<TaskProgress>,
        interrupt_token: Arc<AtomicBool>,
    ) -> Result<(), SiteAdminError> {
        let start = Instant::now();
        let local_dir = LocalDirectory::create(
            &self.settings.work_dir,
            self.task_type().job_name(),
            self.settings.job_log_dir.clone(),
        )?;

        let result = self.run_job(local_dir.job_log(), &progress, &interrupt_token, start);

        // Cleanup errors only surface when the job itself succeeded
        match local_dir.finish() {
            Ok(preserved) => self.preserved_log = preserved,
            Err(e) if result.is_ok() => return Err(e),
            Err(e) => error!("Failed to clean up job directory: {}", e),
        }
        result
    }

    fn task_type(&self) -> TaskType {
        TaskType::CopyFileRoot
    }

    fn action(&self) -> &str {
        match self.plan.option {
            MigrateFilesOption::Copy => "Copying files",
            MigrateFilesOption::Move => "Moving files",
        }
    }

    fn display_target(&self) -> String {
        match self.plan.folders.as_slice() {
            [folder] => format!(
                "{} -> {}",
                folder.source.display(),
                folder.dest.display()
            ),
            folders => format!("{} folders", folders.len()),
        }
    }

    fn on_stopped(&mut self) -> Result<(), SiteAdminError> {
        // Files already copied stay at the destination
        info!("Copy job stopped; files already copied were left in place");
        Ok(())
    }

    fn on_error(&mut self, error_msg: &str) -> Result<(), SiteAdminError> {
        info!("Copy job failed: {}", error_msg);
        Ok(())
    }
}
