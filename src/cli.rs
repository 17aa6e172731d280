use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{ArgGroup, Args, Parser, Subcommand};
use directories::ProjectDirs;
use log::{debug, info, warn};

use crate::config::Config;
use crate::error::SiteAdminError;
use crate::fileroot::{self, CopyPlan, FolderCopy, MigrateFilesOption};
use crate::task::{
    CopyFileRootSettings, CopyFileRootTask, TaskProgressState, TaskRunner, TaskStatus,
};
use crate::utils::Utils;
use crate::views::{self, DialectKind, FileScriptProvider, ViewAction};

#[derive(Parser)]
#[command(
    name = "siteadmin",
    version,
    about = "SiteAdmin: file root migration and SQL view script maintenance"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Copy or move container files to a new file root
    #[command(name = "copy-root")]
    CopyRoot(CopyRootArgs),

    /// Maintain view statements in schema migration scripts
    Views {
        #[command(subcommand)]
        command: ViewsCommand,
    },
}

#[derive(Args)]
#[command(group(ArgGroup::new("input").required(true).args(["plan", "source"])))]
pub struct CopyRootArgs {
    /// TOML plan listing the folders to copy (conflicts with "source")
    #[arg(long, conflicts_with_all = ["source", "dest", "container", "move_files"])]
    pub plan: Option<PathBuf>,

    /// Directory to copy from
    #[arg(long, requires = "dest")]
    pub source: Option<PathBuf>,

    /// Directory to copy to (created if missing)
    #[arg(long, requires = "source")]
    pub dest: Option<PathBuf>,

    /// Container whose file root is changing (default: the source path)
    #[arg(long)]
    pub container: Option<String>,

    /// User recorded against the move (overrides the plan's user)
    #[arg(long)]
    pub user: Option<String>,

    /// Delete the source after a successful copy
    #[arg(long = "move", default_value_t = false)]
    pub move_files: bool,

    /// Do not notify file move listeners
    #[arg(long, default_value_t = false)]
    pub no_notify: bool,
}

#[derive(Subcommand)]
pub enum ViewsCommand {
    /// Collect each schema's current views into drop and create scripts
    Extract {
        #[command(flatten)]
        scripts: ScriptArgs,

        /// Directory for the generated scripts (default: config or the scripts directory)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Only write the drop script
        #[arg(long, conflicts_with = "create")]
        drop: bool,

        /// Only write the create script
        #[arg(long)]
        create: bool,
    },

    /// Remove every view statement from the scripts, in place
    Clear {
        #[command(flatten)]
        scripts: ScriptArgs,
    },
}

#[derive(Args)]
pub struct ScriptArgs {
    /// Directory of <schema>-<from>-<to>.sql scripts
    #[arg(long)]
    pub scripts: PathBuf,

    /// Schema to process; repeat for several (default: every schema found)
    #[arg(long = "schema")]
    pub schemas: Vec<String>,

    /// SQL dialect of the scripts (default from config)
    #[arg(long)]
    pub dialect: Option<DialectKind>,
}

impl Cli {
    pub fn handle_command_line(project_dirs: &ProjectDirs) -> Result<(), SiteAdminError> {
        let args = Cli::parse();
        args.run(project_dirs, &mut io::stdout())
    }

    pub fn run(self, project_dirs: &ProjectDirs, out: &mut dyn Write) -> Result<(), SiteAdminError> {
        match self.command {
            Command::CopyRoot(copy_args) => {
                let default_log_dir = project_dirs.data_local_dir().join("jobs");
                Self::copy_root(copy_args, Some(default_log_dir), out)
            }
            Command::Views { command } => Self::views(command, out),
        }
    }

    fn copy_root(
        args: CopyRootArgs,
        default_log_dir: Option<PathBuf>,
        out: &mut dyn Write,
    ) -> Result<(), SiteAdminError> {
        let plan = args.to_plan()?;
        let config = Config::current();
        let settings = CopyFileRootSettings::from_config(&config.migration, default_log_dir);
        debug!("Copy job settings: {}", settings.to_json()?);

        let listener = if args.no_notify {
            None
        } else {
            Some(fileroot::listener_for(config.migration.move_record().as_deref()))
        };

        let task = CopyFileRootTask::new(plan, settings, listener);
        let start = Instant::now();
        let handle = TaskRunner::spawn(Box::new(task))?;

        let mut last_message = None;
        let mut write_error = None;
        let state = handle.wait_with(Duration::from_millis(250), |snapshot| {
            if write_error.is_none() {
                if let Err(e) = Self::report_status_change(out, &mut last_message, snapshot) {
                    warn!("Failed to write job status: {}", e);
                    write_error = Some(e);
                }
            }
            true
        });
        if let Some(e) = write_error {
            return Err(e.into());
        }

        writeln!(
            out,
            "{} {} in {}",
            state.action,
            state.status.full_name().to_lowercase(),
            Utils::format_elapsed(start.elapsed())
        )?;
        if let Some(progress_bar) = &state.progress_bar {
            writeln!(out, "{}", progress_bar.message)?;
        }

        match state.status {
            TaskStatus::Completed => Ok(()),
            status => Err(SiteAdminError::Error(format!(
                "Job finished with status {}: {}",
                status,
                state.error_message.as_deref().unwrap_or("no details")
            ))),
        }
    }

    /// Print the snapshot's status message if it differs from the last one printed
    fn report_status_change(
        out: &mut dyn Write,
        last_message: &mut Option<String>,
        snapshot: &TaskProgressState,
    ) -> io::Result<()> {
        if snapshot.status_message == *last_message {
            return Ok(());
        }
        if let Some(message) = &snapshot.status_message {
            writeln!(out, "{}...", message)?;
        }
        *last_message = snapshot.status_message.clone();
        Ok(())
    }

    fn views(command: ViewsCommand, out: &mut dyn Write) -> Result<(), SiteAdminError> {
        let config = Config::current();

        let (scripts, action, output) = match command {
            ViewsCommand::Extract {
                scripts,
                output,
                drop,
                create,
            } => {
                // Neither flag means both scripts
                let both = !drop && !create;
                let action = ViewAction::Extract {
                    drop: drop || both,
                    create: create || both,
                };
                (scripts, action, output.or(config.views.output_dir()))
            }
            ViewsCommand::Clear { scripts } => (scripts, ViewAction::Clear, None),
        };

        let dialect = scripts.dialect.unwrap_or(config.views.dialect()).dialect();
        let mut provider = FileScriptProvider::new(&scripts.scripts)?;
        if let Some(output) = &output {
            provider = provider.with_output_dir(output);
        }

        info!(
            "Processing view statements in '{}' ({})",
            scripts.scripts.display(),
            dialect.kind
        );
        views::process_schemas(&provider, &scripts.schemas, dialect, action, out)?;
        Ok(())
    }
}

impl CopyRootArgs {
    fn to_plan(&self) -> Result<CopyPlan, SiteAdminError> {
        let mut plan = match (&self.plan, &self.source, &self.dest) {
            (Some(plan_path), _, _) => CopyPlan::load(plan_path)?,
            (None, Some(source), Some(dest)) => {
                let option = if self.move_files {
                    MigrateFilesOption::Move
                } else {
                    MigrateFilesOption::Copy
                };
                let container = self
                    .container
                    .clone()
                    .unwrap_or_else(|| Self::default_container(source));
                CopyPlan::single(
                    option,
                    None,
                    FolderCopy {
                        container,
                        source: source.clone(),
                        dest: dest.clone(),
                    },
                )
            }
            _ => {
                return Err(SiteAdminError::Validation(
                    "Either --plan or both --source and --dest are required".to_string(),
                ))
            }
        };

        if let Some(user) = &self.user {
            plan.user = user.clone();
        }
        Ok(plan)
    }

    fn default_container(source: &Path) -> String {
        source.to_string_lossy().into_owned()
    }
}
