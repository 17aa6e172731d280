use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info, Level};
use logging_timer::timer;

use crate::error::SiteAdminError;

use super::progress::{TaskProgress, TaskProgressState};
use super::task_status::TaskStatus;
use super::traits::Task;

/// Runs a task on its own thread and maps its outcome to a terminal status.
pub struct TaskRunner;

/// A task that has been handed to its thread
pub struct TaskHandle {
    progress: Arc<TaskProgress>,
    interrupt_token: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl TaskRunner {
    pub fn spawn(mut task: Box<dyn Task>) -> Result<TaskHandle, SiteAdminError> {
        let progress = TaskProgress::new(task.task_type(), task.action(), &task.display_target());
        let interrupt_token = Arc::new(AtomicBool::new(false));

        let task_progress = Arc::clone(&progress);
        let task_interrupt = Arc::clone(&interrupt_token);
        let thread = thread::Builder::new()
            .name(format!("task-{}", task.task_type().short_name().to_lowercase()))
            .spawn(move || {
                let _tmr = timer!(Level::Debug; "TaskRunner::run", "{}", task.task_type());
                task_progress.set_status(TaskStatus::Running);
                let result = task.run(Arc::clone(&task_progress), task_interrupt);
                Self::finish(&mut *task, &task_progress, result);
            })?;

        Ok(TaskHandle {
            progress,
            interrupt_token,
            thread,
        })
    }

    fn finish(task: &mut dyn Task, progress: &TaskProgress, result: Result<(), SiteAdminError>) {
        match result {
            Ok(()) => {
                info!("Task '{}' completed", task.task_type());
                progress.set_status(TaskStatus::Completed);
            }
            Err(SiteAdminError::TaskInterrupted) => {
                info!("Task '{}' was stopped", task.task_type());
                if let Err(stop_err) = task.on_stopped() {
                    error!("Failed to stop task '{}': {}", task.task_type(), stop_err);
                    progress.set_error(&format!("Failed to stop task: {}", stop_err));
                } else {
                    progress.set_status(TaskStatus::Stopped);
                }
            }
            Err(e) => {
                error!("Task '{}' failed: {}", task.task_type(), e);
                let error_msg = e.to_string();
                if let Err(stop_err) = task.on_error(&error_msg) {
                    error!(
                        "Failed to stop task '{}' after error: {}",
                        task.task_type(),
                        stop_err
                    );
                    progress.set_error(&format!(
                        "Task error: {}; Failed to stop: {}",
                        error_msg, stop_err
                    ));
                } else {
                    progress.set_error(&error_msg);
                }
            }
        }
    }
}

impl TaskHandle {
    pub fn progress(&self) -> Arc<TaskProgress> {
        Arc::clone(&self.progress)
    }

    /// Ask the task to stop at its next interrupt check
    pub fn request_stop(&self) {
        self.interrupt_token.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Block until the task is done, calling `on_tick` with a snapshot every
    /// `interval` while it runs. A stop is requested once `on_tick` returns false.
    pub fn wait_with(
        self,
        interval: Duration,
        mut on_tick: impl FnMut(&TaskProgressState) -> bool,
    ) -> TaskProgressState {
        while !self.thread.is_finished() {
            thread::sleep(interval);
            if !on_tick(&self.progress.get_snapshot()) {
                self.request_stop();
            }
        }
        self.join()
    }

    /// Block until the task is done and return its final state
    pub fn join(self) -> TaskProgressState {
        if self.thread.join().is_err() {
            self.progress.set_error("Task thread panicked");
        }
        self.progress.get_snapshot()
    }
}
