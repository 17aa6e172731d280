use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::views::DialectKind;

pub static CONFIG: OnceCell<Config> = OnceCell::new();

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub siteadmin: String,
}

impl LoggingConfig {
    const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    const SITEADMIN_LEVEL: &str = "info";

    fn default() -> Self {
        LoggingConfig {
            siteadmin: Self::SITEADMIN_LEVEL.to_string(),
        }
    }

    fn ensure_valid(&mut self) {
        //      trim and lowercase the string
        //      confirm that it's a valid log level. if not:
        //          - inform the user
        //          - use the default
        let str_original = self.siteadmin.clone();
        self.siteadmin = self.siteadmin.trim().to_ascii_lowercase();
        if !Self::LOG_LEVELS.contains(&self.siteadmin.as_str()) {
            eprintln!(
                "Config error: siteadmin log level of '{}' is invalid - using default of '{}'",
                str_original,
                Self::SITEADMIN_LEVEL
            );
            self.siteadmin = Self::SITEADMIN_LEVEL.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MigrationConfig {
    progress_interval_secs: u64,
    skip_unchanged: bool,
    work_dir: Option<String>,
    job_log_dir: Option<String>,
    move_record: Option<String>,
}

impl MigrationConfig {
    const PROGRESS_INTERVAL_SECS: u64 = 60;

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }

    pub fn skip_unchanged(&self) -> bool {
        self.skip_unchanged
    }

    /// Parent directory for per-job scratch directories. Falls back to the
    /// system temp directory.
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Where job logs are preserved once a job's scratch directory is released
    pub fn job_log_dir(&self) -> Option<PathBuf> {
        self.job_log_dir.as_ref().map(PathBuf::from)
    }

    pub fn move_record(&self) -> Option<PathBuf> {
        self.move_record.as_ref().map(PathBuf::from)
    }

    fn ensure_valid(&mut self) {
        if self.progress_interval_secs == 0 {
            eprintln!(
                "Config error: progress_interval_secs of 0 is invalid - using default of '{}'",
                Self::PROGRESS_INTERVAL_SECS
            );
            self.progress_interval_secs = Self::PROGRESS_INTERVAL_SECS;
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        MigrationConfig {
            progress_interval_secs: Self::PROGRESS_INTERVAL_SECS,
            skip_unchanged: false,
            work_dir: None,
            job_log_dir: None,
            move_record: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ViewsConfig {
    dialect: String,
    output_dir: Option<String>,
}

impl ViewsConfig {
    pub fn dialect(&self) -> DialectKind {
        // ensure_valid() guarantees this parses; PostgreSQL is the fallback either way
        self.dialect.parse().unwrap_or(DialectKind::PostgreSql)
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        self.output_dir.as_ref().map(PathBuf::from)
    }

    fn default() -> Self {
        ViewsConfig {
            dialect: DialectKind::PostgreSql.to_string(),
            output_dir: None,
        }
    }

    fn ensure_valid(&mut self) {
        let str_original = self.dialect.clone();
        self.dialect = self.dialect.trim().to_ascii_lowercase();
        if self.dialect.parse::<DialectKind>().is_err() {
            eprintln!(
                "Config error: dialect of '{}' is invalid - using default of '{}'",
                str_original,
                DialectKind::PostgreSql
            );
            self.dialect = DialectKind::PostgreSql.to_string();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub logging: LoggingConfig,
    pub migration: MigrationConfig,
    pub views: ViewsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            logging: LoggingConfig::default(),
            migration: MigrationConfig::default(),
            views: ViewsConfig::default(),
        }
    }
}

impl Config {
    const ENV_PREFIX: &str = "SITEADMIN_";

    /// Loads the configuration from a TOML file located in the app's data directory,
    /// then applies `SITEADMIN_` environment overrides.
    /// If the file is missing or fails to parse, defaults are used.
    /// Additionally, writes the default config to disk if no file exists.
    pub fn load_config(project_dirs: &ProjectDirs) -> Self {
        let config_path = project_dirs.data_local_dir().join("config.toml");

        let default_config = Config::default();

        // If the config file doesn't exist, write the default configuration to disk.
        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    eprintln!(
                        "Failed to create configuration directory {}: {}",
                        parent.display(),
                        e
                    );
                }
            }
            if let Ok(toml_string) = toml::to_string_pretty(&default_config) {
                if let Err(e) = fs::write(&config_path, toml_string) {
                    eprintln!(
                        "Failed to write default config to {}: {}",
                        config_path.display(),
                        e
                    );
                }
            } else {
                eprintln!("Failed to serialize default config.");
            }
        }

        let figment = Self::figment(default_config.clone()).merge(Toml::file(&config_path));
        let figment = figment.merge(Env::prefixed(Self::ENV_PREFIX).split("__"));

        // Attempt to extract the configuration; on error, log a message and fall back to defaults.
        let mut config = figment.extract().unwrap_or_else(|err| {
            eprintln!(
                "Could not load config file {}: {}. Using default configuration.",
                config_path.display(),
                err
            );
            default_config
        });

        config.ensure_valid();

        config
    }

    /// The active configuration, or defaults when none has been installed
    pub fn current() -> Config {
        CONFIG.get().cloned().unwrap_or_default()
    }

    fn figment(defaults: Config) -> Figment {
        Figment::from(Serialized::defaults(defaults))
    }

    fn ensure_valid(&mut self) {
        self.logging.ensure_valid();
        self.migration.ensure_valid();
        self.views.ensure_valid();
    }
}
