//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{check, info, routes};
use crate::config::GlobalConfig;

/// Environment variable holding log filter directives
pub const LOG_ENV: &str = "GESTALT_LOG";

const DEFAULT_LOG_FILTER: &str = "gestalt_cli=warn";
const VERBOSE_LOG_FILTER: &str = "gestalt_cli=debug";

#[derive(Debug, Parser)]
#[command(name = "gestalt")]
#[command(author, version, about = "Project tooling for Gestalt")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags every command accepts
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Output format (defaults to the configured format, then text)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
}

/// Flags of commands that operate on a project
#[derive(Debug, Clone, Args)]
pub struct ProjectArgs {
    /// The directory containing the Gestalt project
    #[arg(long, short = 'p', env = "GESTALT_PATH", default_value = ".", global = true)]
    pub path: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Output an overview of a project
    Info {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// List the routes of every target
    Routes {
        #[command(flatten)]
        project: ProjectArgs,

        /// Only list the routes of this target
        #[arg(long, short = 't')]
        target: Option<String>,
    },

    /// Check the project's routes, code and lint
    Check(check::CheckArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = GlobalConfig::load()?;

    init_logging(cli.global.verbose, config.log.as_deref());

    let format = cli.global.format.or(config.default_format).unwrap_or_default();
    let output = Output::new(format);

    debug!(command = ?cli.command, ?format, "running command");

    match cli.command {
        Commands::Info { project } => info::run(&project, &output)?,
        Commands::Routes { project, target } => routes::run(&project, target.as_deref(), &output)?,
        Commands::Check(args) => check::run(&args, &output)?,
    }

    debug!("command completed");
    Ok(())
}

/// Installs the stderr log subscriber
pub fn init_logging(verbose: bool, configured: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(log_filter(verbose, configured))
        .with_target(false)
        .try_init();
}

/// Picks the log filter: `GESTALT_LOG`, then `--verbose`, then the config
fn log_filter(verbose: bool, configured: Option<&str>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        return filter;
    }

    let directives = match (verbose, configured) {
        (true, _) => VERBOSE_LOG_FILTER,
        (false, Some(configured)) => configured,
        (false, None) => DEFAULT_LOG_FILTER,
    };

    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn project_path_defaults_to_cwd() {
        let cli = Cli::try_parse_from(["gestalt", "info"]).unwrap();
        match cli.command {
            Commands::Info { project } => {
                if std::env::var_os("GESTALT_PATH").is_none() {
                    assert_eq!(project.path, PathBuf::from("."));
                }
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn global_flags_after_the_command() {
        let cli = Cli::try_parse_from(["gestalt", "routes", "--format", "json", "-p", "app"]).unwrap();

        assert_eq!(cli.global.format, Some(OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Routes { ref project, .. } if project.path == PathBuf::from("app")));
    }

    #[test]
    fn check_accepts_path_after_subcommand() {
        let cli = Cli::try_parse_from(["gestalt", "check", "code", "--path", "app"]).unwrap();

        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.project.path, PathBuf::from("app"));
                assert!(matches!(args.command, Some(check::CheckCommands::Code)));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
