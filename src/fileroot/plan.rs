use std::path::{Path, PathBuf};

use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::SiteAdminError;

/// What happens to the source tree once it has been copied
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MigrateFilesOption {
    Copy,
    Move,
}

impl MigrateFilesOption {
    pub fn description(&self) -> &'static str {
        match self {
            MigrateFilesOption::Copy => {
                "Copy files to the new file root and leave the originals in place"
            }
            MigrateFilesOption::Move => {
                "Move files to the new file root, deleting the originals after a successful copy"
            }
        }
    }
}

/// One container's file root change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderCopy {
    pub container: String,
    pub source: PathBuf,
    pub dest: PathBuf,
}

/// Every folder handled by one copy job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CopyPlan {
    pub option: MigrateFilesOption,
    #[serde(default = "CopyPlan::default_user")]
    pub user: String,
    #[serde(default)]
    pub folders: Vec<FolderCopy>,
}

impl CopyPlan {
    const DEFAULT_USER: &str = "siteadmin";

    fn default_user() -> String {
        Self::DEFAULT_USER.to_string()
    }

    pub fn single(option: MigrateFilesOption, user: Option<String>, folder: FolderCopy) -> Self {
        CopyPlan {
            option,
            user: user.unwrap_or_else(Self::default_user),
            folders: vec![folder],
        }
    }

    /// Load a plan from a TOML file:
    ///
    /// ```toml
    /// option = "move"
    /// user = "admin@example.com"
    ///
    /// [[folders]]
    /// container = "/home/project"
    /// source = "/old/files/project"
    /// dest = "/new/files/project"
    /// ```
    pub fn load(path: &Path) -> Result<Self, SiteAdminError> {
        if !path.is_file() {
            return Err(SiteAdminError::Validation(format!(
                "Plan file '{}' does not exist",
                path.display()
            )));
        }

        Figment::from(Toml::file(path))
            .extract()
            .map_err(|e| SiteAdminError::Config(Box::new(e)))
    }

    pub fn containers(&self) -> Vec<&str> {
        self.folders.iter().map(|f| f.container.as_str()).collect()
    }
}
