//! Plugin entry module loading

use std::path::{Path, PathBuf};

use crate::script::{self, AliasRule, EvaluationError};

use super::{DiscoveryError, ENTRY_EXTENSIONS, ENTRY_MODULE_NAME};

/// Loads a module and extracts its default export
///
/// The default implementation is [`ScriptEvaluator`]. Tests and embedders can
/// substitute their own to avoid touching real plugin sources.
pub trait ModuleEvaluator: Send + Sync {
    fn default_export(&self, entry: &Path, aliases: &[AliasRule]) -> Result<serde_json::Value, EvaluationError>;
}

/// Evaluates modules on the QuickJS host in [`crate::script`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptEvaluator;

impl ModuleEvaluator for ScriptEvaluator {
    fn default_export(&self, entry: &Path, aliases: &[AliasRule]) -> Result<serde_json::Value, EvaluationError> {
        script::evaluate_default_export(entry, aliases)
    }
}

/// Finds the plugin's entry module (`plugin.ts`, then `plugin.js`)
pub fn entry_module(directory: &Path) -> Result<PathBuf, DiscoveryError> {
    ENTRY_EXTENSIONS
        .iter()
        .map(|ext| directory.join(format!("{}.{}", ENTRY_MODULE_NAME, ext)))
        .find(|path| path.is_file())
        .ok_or_else(|| DiscoveryError::EntryModuleNotFound(directory.to_path_buf()))
}

/// Loads the plugin definition exported by the entry module in `directory`
pub fn load_entry_module(
    directory: &Path,
    aliases: &[AliasRule],
    evaluator: &dyn ModuleEvaluator,
) -> Result<serde_json::Value, DiscoveryError> {
    let entry = entry_module(directory)?;
    Ok(evaluator.default_export(&entry, aliases)?)
}
