//! Moving a container's files from one file root to another.

mod listener;
mod migrator;
mod plan;

pub use listener::{FileMoveListener, LoggingMoveListener, MoveRecord, MoveRecordListener};
pub use migrator::{CopyStats, DirectoryMigrator, MigrationSettings};
pub use plan::{CopyPlan, FolderCopy, MigrateFilesOption};

use std::path::Path;

/// The listener a job notifies: records moves to `move_record` when one is
/// configured, otherwise just logs them.
pub fn listener_for(move_record: Option<&Path>) -> Box<dyn FileMoveListener> {
    match move_record {
        Some(path) => Box::new(MoveRecordListener::new(path)),
        None => Box::new(LoggingMoveListener),
    }
}
