use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::task_status::TaskStatus;
use super::task_type::TaskType;

/// Progress bar state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgressBar {
    /// Percentage complete (0-100)
    pub percentage: f64,
    /// Pre-formatted "X / Y unit" message
    pub message: String,
}

/// Point-in-time copy of a task's progress, safe to hand to other threads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgressState {
    pub task_type: TaskType,
    pub action: String,
    pub target: String,
    pub status: TaskStatus,
    pub status_message: Option<String>,
    pub error_message: Option<String>,
    pub breadcrumbs: Option<Vec<String>>,
    pub progress_bar: Option<TaskProgressBar>,
}

struct TaskProgressInternalState {
    task_type: TaskType,
    action: String,
    target: String,

    status: TaskStatus,
    status_message: Option<String>,
    error_message: Option<String>,
    breadcrumbs: Vec<String>,

    progress_completed: u64,
    progress_total: u64,
    progress_unit: Option<String>,
}

impl TaskProgressInternalState {
    fn progress_bar(&self) -> Option<TaskProgressBar> {
        if self.progress_total == 0 && self.progress_completed == 0 {
            return None;
        }

        let completed = self.progress_completed;
        let total = self.progress_total;
        let percentage = if total > 0 {
            ((completed as f64 / total as f64) * 100.0).min(100.0)
        } else {
            0.0
        };
        let message = match &self.progress_unit {
            Some(unit) => format!("{} / {} {}", completed, total, unit),
            None => format!("{} / {}", completed, total),
        };
        Some(TaskProgressBar {
            percentage,
            message,
        })
    }
}

/// Progress reporter shared between a running task and whoever watches it
pub struct TaskProgress {
    state: Mutex<TaskProgressInternalState>,
}

impl TaskProgress {
    pub fn new(task_type: TaskType, action: &str, target: &str) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TaskProgressInternalState {
                task_type,
                action: action.to_string(),
                target: target.to_string(),
                status: TaskStatus::Pending,
                status_message: None,
                error_message: None,
                breadcrumbs: Vec::new(),
                progress_completed: 0,
                progress_total: 0,
                progress_unit: None,
            }),
        })
    }

    // ========================================================================
    // Status message & Breadcrumbs
    // ========================================================================

    /// Set the human-readable status message ("Getting stats", "Copying files")
    pub fn set_status_message(&self, message: &str) {
        self.state.lock().unwrap().status_message = Some(message.to_string());
    }

    /// Add a breadcrumb for a completed unit of work
    pub fn add_breadcrumb(&self, text: &str) {
        self.state.lock().unwrap().breadcrumbs.push(text.to_string());
    }

    // ========================================================================
    // Progress counter
    // ========================================================================

    /// Set up counter-based progress tracking
    ///
    /// The optional `unit` parameter (e.g., "files") is used in progress messages.
    pub fn set_progress_total(&self, total: u64, initial_completed: u64, unit: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        state.progress_total = total;
        state.progress_completed = initial_completed;
        state.progress_unit = unit.map(|s| s.to_string());
    }

    /// Advance the progress counter
    pub fn advance_progress(&self, count: u64) {
        let mut state = self.state.lock().unwrap();
        state.progress_completed = state.progress_completed.saturating_add(count);
    }

    // ========================================================================
    // Status
    // ========================================================================

    pub fn set_status(&self, status: TaskStatus) {
        let mut state = self.state.lock().unwrap();
        state.status = status;
        if status != TaskStatus::Error {
            state.error_message = None;
        }
    }

    /// Set error status with message
    pub fn set_error(&self, message: &str) {
        let mut state = self.state.lock().unwrap();
        state.status = TaskStatus::Error;
        state.error_message = Some(message.to_string());
    }

    pub fn get_status(&self) -> TaskStatus {
        self.state.lock().unwrap().status
    }

    // ========================================================================
    // Snapshot
    // ========================================================================

    pub fn get_snapshot(&self) -> TaskProgressState {
        let state = self.state.lock().unwrap();

        TaskProgressState {
            task_type: state.task_type,
            action: state.action.clone(),
            target: state.target.clone(),
            status: state.status,
            status_message: state.status_message.clone(),
            error_message: state.error_message.clone(),
            breadcrumbs: if state.breadcrumbs.is_empty() {
                None
            } else {
                Some(state.breadcrumbs.clone())
            },
            progress_bar: state.progress_bar(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_progress_is_pending() {
        let progress = TaskProgress::new(TaskType::CopyFileRoot, "Copying", "/old -> /new");
        let snapshot = progress.get_snapshot();
        assert_eq!(snapshot.status, TaskStatus::Pending);
        assert_eq!(snapshot.action, "Copying");
        assert_eq!(snapshot.target, "/old -> /new");
        assert!(snapshot.progress_bar.is_none());
        assert!(snapshot.breadcrumbs.is_none());
    }

    #[test]
    fn test_counter_progress() {
        let progress = TaskProgress::new(TaskType::CopyFileRoot, "Copying", "x");
        progress.set_progress_total(4, 0, Some("files"));
        progress.advance_progress(1);
        progress.advance_progress(2);

        let bar = progress.get_snapshot().progress_bar.unwrap();
        assert_eq!(bar.message, "3 / 4 files");
        assert_eq!(bar.percentage, 75.0);
    }

    #[test]
    fn test_progress_past_total_is_capped() {
        let progress = TaskProgress::new(TaskType::CopyFileRoot, "Copying", "x");
        progress.set_progress_total(1, 0, None);
        progress.advance_progress(3);

        let bar = progress.get_snapshot().progress_bar.unwrap();
        assert_eq!(bar.message, "3 / 1");
        assert_eq!(bar.percentage, 100.0);
    }

    #[test]
    fn test_error_message_cleared_by_later_status() {
        let progress = TaskProgress::new(TaskType::CopyFileRoot, "Copying", "x");
        progress.set_error("disk full");
        let snapshot = progress.get_snapshot();
        assert_eq!(snapshot.status, TaskStatus::Error);
        assert_eq!(snapshot.error_message.as_deref(), Some("disk full"));

        progress.set_status(TaskStatus::Running);
        assert!(progress.get_snapshot().error_message.is_none());
    }

    #[test]
    fn test_status_message_and_breadcrumbs() {
        let progress = TaskProgress::new(TaskType::CopyFileRoot, "Copying", "x");
        progress.set_status_message("Getting stats");
        progress.add_breadcrumb("Copied /home/a");

        let snapshot = progress.get_snapshot();
        assert_eq!(snapshot.status_message.as_deref(), Some("Getting stats"));
        assert_eq!(snapshot.breadcrumbs, Some(vec!["Copied /home/a".to_string()]));
    }
}
