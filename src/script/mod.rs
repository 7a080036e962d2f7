//! # Module Evaluation
//!
//! Evaluation of TypeScript/JavaScript declaration modules.
//!
//! Plugins, targets and project manifests are written as ES modules whose
//! default export is a plain declaration, usually wrapped in an identity
//! builder for editor support:
//!
//! ```text
//! import {definePlugin} from "gestaltjs/plugin"
//!
//! export default definePlugin({
//!   renderer: { dependencies: { "vue": "^3.2.0" } },
//! })
//! ```
//!
//! Modules run on QuickJS (through `rquickjs`), one runtime per evaluation.
//! TypeScript type syntax is erased before a module is handed to the engine,
//! and the default export is brought back as JSON. A default export that is
//! a function without parameters is called, and awaited when it returns a
//! promise.
//!
//! ## Resolution
//!
//! | Specifier | Resolution |
//! |-----------|------------|
//! | Matches an [`AliasRule`] | Rewritten path |
//! | `./x`, `../x`, `/x` | File on disk, trying extensions and `index` files |
//! | Bare package | Closest `node_modules`, then `exports`, `module`, `main` or `index` |
//! | `node:*` | Unsupported |

mod alias;
mod engine;
mod lexer;
mod resolve;
mod strip;

use std::path::{Path, PathBuf};

use thiserror::Error;

pub use alias::{rewrite, AliasFind, AliasRule};
pub use resolve::{find_module, Resolver};

/// Failure raised while loading or evaluating a module
///
/// These describe problems in the evaluated code itself, not in the caller.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("{}:{line}:{column}: {message}", path.display())]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Cannot resolve '{specifier}' imported from {}", path.display())]
    UnresolvedImport { path: PathBuf, specifier: String },

    #[error(
        "Cannot resolve '{specifier}' imported from {}: alias target {} does not exist",
        path.display(),
        target.display()
    )]
    UnresolvedAlias {
        path: PathBuf,
        specifier: String,
        target: PathBuf,
    },

    #[error("{} has no default export", .0.display())]
    NoDefaultExport(PathBuf),

    #[error("{}: {message}", path.display())]
    Unsupported { path: PathBuf, message: String },

    #[error("Evaluating {} failed: {message}", path.display())]
    Exception { path: PathBuf, message: String },

    #[error("The JavaScript engine failed while evaluating {}: {message}", path.display())]
    Engine { path: PathBuf, message: String },

    #[error("Failed to read module {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON module {}", path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Evaluates the module at `entry` and returns its default export as JSON
///
/// `aliases` rewrite import specifiers anywhere in the module graph.
pub fn evaluate_default_export(entry: &Path, aliases: &[AliasRule]) -> Result<serde_json::Value, EvaluationError> {
    engine::evaluate(entry, Resolver::new(aliases.to_vec()))
}
