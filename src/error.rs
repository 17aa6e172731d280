use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteAdminError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error), // Converts io::Error into SiteAdminError automatically

    #[error("I/O error at '{}': {source}", path.display())]
    PathIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Task interrupted")]
    TaskInterrupted,

    #[error("Pattern error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Logging error: {0}")]
    Logging(#[from] flexi_logger::FlexiLoggerError),

    #[error("Error: {0}")]
    Error(String), // Allows custom application errors
}

impl SiteAdminError {
    /// Wrap an I/O error together with the path it occurred on
    pub fn at_path(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SiteAdminError::PathIo {
            path: path.into(),
            source,
        }
    }
}
