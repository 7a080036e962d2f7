//! Project checks

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use super::app::ProjectArgs;
use super::output::{relativize, Output, Style};
use crate::error::Fatal;
use crate::project::{find_conflicts, Project, RouteConflict};

#[derive(Debug, Clone, Args)]
pub struct CheckArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[command(subcommand)]
    pub command: Option<CheckCommands>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum CheckCommands {
    /// Type-check the code with TypeScript
    Code,

    /// Lint the code with ESLint
    Lint,

    /// Look for files that serve the same route
    Routes,
}

/// An external tool installed in `node_modules/.bin`
struct Tool {
    executable: &'static str,
    args: &'static [&'static str],
    display_name: &'static str,
    package: &'static str,
}

const TYPESCRIPT: Tool = Tool {
    executable: "tsc",
    args: &["--noEmit"],
    display_name: "TypeScript",
    package: "typescript",
};

const ESLINT: Tool = Tool {
    executable: "eslint",
    args: &["."],
    display_name: "ESLint",
    package: "eslint",
};

pub fn run(args: &CheckArgs, output: &Output) -> Result<()> {
    let project = Project::load(&args.project.path)?;

    match args.command {
        Some(CheckCommands::Code) => run_tool(&project, &TYPESCRIPT),
        Some(CheckCommands::Lint) => run_tool(&project, &ESLINT),
        Some(CheckCommands::Routes) => check_routes(&project, output),
        None => {
            check_routes(&project, output)?;
            run_tool(&project, &TYPESCRIPT)?;
            run_tool(&project, &ESLINT)
        }
    }
}

#[derive(Serialize)]
struct ConflictReport<'a> {
    conflicts: &'a [TargetConflicts<'a>],
}

#[derive(Serialize)]
struct TargetConflicts<'a> {
    target: &'a str,
    conflicts: Vec<RouteConflict>,
}

fn check_routes(project: &Project, output: &Output) -> Result<()> {
    let conflicts: Vec<TargetConflicts> = project
        .targets
        .iter()
        .map(|target| TargetConflicts {
            target: &target.name,
            conflicts: find_conflicts(&target.routes),
        })
        .filter(|t| !t.conflicts.is_empty())
        .collect();

    if conflicts.is_empty() {
        if output.is_json() {
            output.data(&ConflictReport { conflicts: &[] });
        } else {
            output.success(&format!("{} No conflicting routes", output.style(Style::Heading, "✓")));
        }
        return Ok(());
    }

    let mut cause = Vec::new();
    for target in &conflicts {
        for conflict in &target.conflicts {
            let files: Vec<String> = conflict.files.iter().map(|f| relativize(f)).collect();
            cause.push(format!("{}: {} is served by {}", target.target, conflict.path, files.join(", ")));
        }
    }

    if output.is_json() {
        output.data(&ConflictReport { conflicts: &conflicts });
    }

    Err(Fatal::abort(format!("Found {} conflicting routes", cause.len()))
        .with_cause(cause.join("\n"))
        .with_next("Rename or remove files so that every route is served by a single file")
        .into())
}

fn run_tool(project: &Project, tool: &Tool) -> Result<()> {
    let executable = find_executable(&project.directory, tool.executable).ok_or_else(|| {
        Fatal::abort(format!("Couldn't find {}", tool.display_name)).with_next(format!(
            "Add {} to the project's devDependencies and install them",
            tool.package
        ))
    })?;

    debug!(executable = %executable.display(), args = ?tool.args, "running {}", tool.display_name);

    let status = Command::new(&executable)
        .args(tool.args)
        .current_dir(&project.directory)
        .status()
        .with_context(|| format!("Failed to run {}", executable.display()))?;

    if !status.success() {
        info!(status = ?status.code(), "{} failed", tool.display_name);
        return Err(Fatal::abort_silent().into());
    }

    Ok(())
}

/// Finds `node_modules/.bin/<name>` in `directory` or its ancestors
fn find_executable(directory: &Path, name: &str) -> Option<PathBuf> {
    directory
        .ancestors()
        .map(|dir| dir.join("node_modules").join(".bin").join(name))
        .find(|candidate| candidate.is_file())
}
