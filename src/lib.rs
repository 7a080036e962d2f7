//! Gestalt CLI - Project tooling for the Gestalt framework
//!
//! Loads a Gestalt project (its manifest, plugins, targets and routes) and
//! exposes it through the `gestalt` command. Plugins are npm packages named
//! `gestalt-plugin-*` whose entry module is evaluated statically; see
//! [`plugin`] for discovery and [`script`] for evaluation.

pub mod cli;
pub mod config;
pub mod error;
pub mod plugin;
pub mod project;
pub mod script;

pub use plugin::{discover, merge, DiscoveryError, DiscoveryOptions, MergeError, Plugin, PluginLoader};
pub use project::{Project, ProjectConfiguration};
