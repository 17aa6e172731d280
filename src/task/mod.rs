mod copy_file_root_task;
mod job_log;
mod local_directory;
mod progress;
mod runner;
mod task_status;
mod task_type;
mod traits;

pub use copy_file_root_task::{CopyFileRootSettings, CopyFileRootTask};
pub use job_log::JobLog;
pub use local_directory::LocalDirectory;
pub use progress::{TaskProgress, TaskProgressBar, TaskProgressState};
pub use runner::{TaskHandle, TaskRunner};
pub use task_status::TaskStatus;
pub use task_type::TaskType;
pub use traits::Task;
