use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// A task starts `Pending`, becomes `Running` once its thread picks it up,
/// and ends in exactly one of the terminal states.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,   // Created, not yet started
    Running,   // Currently executing
    Completed, // Finished successfully
    Stopped,   // Interrupted on request
    Error,     // Task failed
}

impl TaskStatus {
    pub fn full_name(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Running => "Running",
            TaskStatus::Completed => "Completed",
            TaskStatus::Stopped => "Stopped",
            TaskStatus::Error => "Error",
        }
    }

    /// Returns true if this is a terminal status (task is done)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Stopped | TaskStatus::Error
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_name())
    }
}
