use serde::{Deserialize, Serialize};

/// Task type enum - what kind of background job is running
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CopyFileRoot,
}

impl TaskType {
    pub fn short_name(&self) -> &'static str {
        match self {
            TaskType::CopyFileRoot => "CF",
        }
    }

    pub fn full_name(&self) -> &'static str {
        match self {
            TaskType::CopyFileRoot => "Copy File Root",
        }
    }

    /// Base name for the job's scratch directory and log file
    pub fn job_name(&self) -> &'static str {
        match self {
            TaskType::CopyFileRoot => "copy_directory_fileroot_change",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_names() {
        assert_eq!(TaskType::CopyFileRoot.short_name(), "CF");
        assert_eq!(TaskType::CopyFileRoot.full_name(), "Copy File Root");
        assert_eq!(
            TaskType::CopyFileRoot.job_name(),
            "copy_directory_fileroot_change"
        );
        assert_eq!(format!("{}", TaskType::CopyFileRoot), "Copy File Root");
    }

    #[test]
    fn test_task_type_serde_roundtrip() {
        let json = serde_json::to_string(&TaskType::CopyFileRoot).unwrap();
        assert_eq!(json, "\"copy_file_root\"");
        let restored: TaskType = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, TaskType::CopyFileRoot);
    }
}
