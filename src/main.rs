use directories::ProjectDirs;
use flexi_logger::{
    detailed_format, Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming,
};
use log::{debug, error};

use siteadmin::cli::Cli;
use siteadmin::config::{Config, CONFIG};
use siteadmin::error::SiteAdminError;

const LOG_FILE_MAX_BYTES: u64 = 10 * 1024 * 1024;
const LOG_FILES_KEPT: usize = 7;

fn main() {
    let Some(project_dirs) = ProjectDirs::from("", "", "siteadmin") else {
        eprintln!("Could not determine the application data directory");
        std::process::exit(1);
    };

    let config = Config::load_config(&project_dirs);
    let logger = match setup_logging(&project_dirs, &config) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("Failed to start logging: {}", e);
            None
        }
    };
    if CONFIG.set(config).is_err() {
        eprintln!("Configuration was already initialized");
    }

    debug!(
        "Command-line args: {:?}",
        std::env::args_os().collect::<Vec<_>>()
    );

    let exit_code = match Cli::handle_command_line(&project_dirs) {
        Ok(()) => 0,
        Err(err) => {
            error!("{:?}", err);
            eprintln!("{}", err);
            1
        }
    };

    // process::exit skips destructors
    if let Some(logger) = logger {
        logger.flush();
        logger.shutdown();
    }
    std::process::exit(exit_code);
}

fn setup_logging(
    project_dirs: &ProjectDirs,
    config: &Config,
) -> Result<LoggerHandle, SiteAdminError> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    let spec = format!("siteadmin={}", config.logging.siteadmin);

    let handle = Logger::try_with_str(&spec)?
        .log_to_file(FileSpec::default().directory(&log_dir).basename("siteadmin"))
        .format_for_files(detailed_format)
        .duplicate_to_stderr(Duplicate::Warn)
        .rotate(
            Criterion::Size(LOG_FILE_MAX_BYTES),
            Naming::Timestamps,
            Cleanup::KeepLogFiles(LOG_FILES_KEPT),
        )
        .start()?;

    Ok(handle)
}
