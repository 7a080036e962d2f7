//! # Plugin System
//!
//! Plugins extend a Gestalt project, most importantly with a renderer (the
//! UI technology the project is built with). They are regular npm packages.
//!
//! ## Discovery
//!
//! Each root (the project directory plus any configured plugin directories)
//! is scanned for `node_modules/gestalt-plugin-*` directories. Every
//! candidate must contain:
//!
//! | File | Purpose |
//! |------|---------|
//! | `package.json` | Its `name` identifies the plugin |
//! | `plugin.ts` or `plugin.js` | Default export is the plugin definition |
//!
//! ```text
//! roots ──► node_modules/gestalt-plugin-* ──► validate ──► evaluate ──► normalize
//!                                                                         │
//!                    ProjectConfiguration ◄──────── merge ◄───────────────┘
//! ```
//!
//! The plugin name is the package name without the `gestalt-plugin-` prefix.
//! Names must be unique across all roots.
//!
//! ## Key Types
//!
//! - [`PluginLoader`] - Discovers and loads plugins
//! - [`Plugin`] - Normalized plugin record
//! - [`ModuleEvaluator`] - Turns an entry module into its definition
//! - [`merge`] - Registers plugins into a [`crate::project::ProjectConfiguration`]

mod discovery;
mod loader;
mod manifest;
mod merge;
mod normalize;

pub use discovery::{
    discover, load_known_plugin, DiscoveryError, DiscoveryOptions, PluginLoader, BASELINE_RENDERER_NAME,
    BASELINE_RENDERER_SPECIFIER,
};
pub use loader::{entry_module, load_entry_module, ModuleEvaluator, ScriptEvaluator};
pub use manifest::{short_name, validate, PluginIdentity};
pub use merge::{merge, Constraint, MergeError};
pub use normalize::{normalize, Plugin, Renderer};

/// Package name prefix that marks a plugin
pub const PLUGIN_PREFIX: &str = "gestalt-plugin-";

/// Base name of a plugin's entry module
pub const ENTRY_MODULE_NAME: &str = "plugin";

/// Entry module extensions, in order of preference
pub const ENTRY_EXTENSIONS: [&str; 2] = ["ts", "js"];
