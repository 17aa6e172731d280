use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::SiteAdminError;

use super::progress::TaskProgress;
use super::task_type::TaskType;

/// Trait for long-running, stoppable background jobs
///
/// - `run`: Execute the task on the runner's thread
/// - `task_type`, `action`, `display_target`: Metadata for TaskProgress creation
/// - `on_stopped`, `on_error`: Cleanup handlers called by the runner on interrupt/failure
///
/// The trait is object-safe so TaskRunner can work with Box<dyn Task>
pub trait Task: Send {
    /// Execute the task. Implementations poll `interrupt_token` between units of
    /// work and return `SiteAdminError::TaskInterrupted` once it is set.
    fn run(
        &mut self,
        progress: Arc<TaskProgress>,
        interrupt_token: Arc<AtomicBool>,
    ) -> Result<(), SiteAdminError>;

    fn task_type(&self) -> TaskType;

    /// Human-readable action name for progress display (e.g., "Copying")
    fn action(&self) -> &str;

    /// Human-readable target for progress display
    fn display_target(&self) -> String;

    /// Handle task stopped on request
    fn on_stopped(&mut self) -> Result<(), SiteAdminError>;

    /// Handle task error
    /// Called by the runner when run() returns an error that isn't an interrupt
    fn on_error(&mut self, error_msg: &str) -> Result<(), SiteAdminError>;
}
