//! # Command-Line Interface
//!
//! User-facing commands and output formatting.
//!
//! | Command | Purpose |
//! |---------|---------|
//! | `info` | Project overview: manifest, plugins, targets |
//! | `routes` | Routes of every target |
//! | `check` | Route conflicts, then `tsc --noEmit`, then `eslint .` |
//! | `check code\|lint\|routes` | A single check |
//!
//! ## Flags
//!
//! - `--format text|json` on every command (the global config's
//!   `default_format` applies when it's missing)
//! - `--verbose` enables debug logging; `GESTALT_LOG` takes precedence
//! - `--path`/`-p` (or `GESTALT_PATH`) selects the project directory
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.
//! Failures are presented by [`crate::error::handle`].

mod app;
mod check;
mod info;
mod output;
mod routes;

pub use app::{init_logging, run, Cli, Commands, GlobalArgs, ProjectArgs, LOG_ENV};
pub use check::{CheckArgs, CheckCommands};
pub use output::{relativize, Output, OutputFormat, Style};
