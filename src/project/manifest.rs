//! Project manifest (`gestalt.config.ts`)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::plugin::Plugin;
use crate::script::{self, AliasRule};

use super::ProjectError;

/// Base name of the project manifest
pub const MANIFEST_NAME: &str = "gestalt.config";

/// Manifest extensions, in order of preference
pub const MANIFEST_EXTENSIONS: [&str; 2] = ["ts", "js"];

/// A project's configuration with its registered plugins
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfiguration {
    pub name: String,

    pub manifest_path: PathBuf,

    /// Extra roots scanned for plugins, besides the project directory
    pub plugin_directories: Vec<PathBuf>,

    /// Exact import aliases declared by the project
    pub alias: BTreeMap<String, PathBuf>,

    /// Registered plugins, sorted by name
    pub plugins: Vec<Plugin>,

    /// Renderer packages required by the plugins, with their versions
    pub renderer_dependencies: BTreeMap<String, String>,
}

/// The shape of the manifest's default export
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserConfiguration {
    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    plugin_directories: Vec<String>,

    #[serde(default)]
    alias: BTreeMap<String, String>,
}

impl ProjectConfiguration {
    /// Creates an empty configuration
    pub fn new(name: impl Into<String>, manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            manifest_path: manifest_path.into(),
            plugin_directories: Vec::new(),
            alias: BTreeMap::new(),
            plugins: Vec::new(),
            renderer_dependencies: BTreeMap::new(),
        }
    }

    /// Loads the manifest of the project in `directory`
    ///
    /// `aliases` are available to imports in the manifest. Relative paths in
    /// the manifest are resolved against `directory`.
    pub fn load(directory: &Path, aliases: &[AliasRule]) -> Result<Self, ProjectError> {
        let manifest_path =
            find_manifest(directory).ok_or_else(|| ProjectError::ManifestNotFound(directory.to_path_buf()))?;

        let exported = script::evaluate_default_export(&manifest_path, aliases)?;
        if !exported.is_object() {
            return Err(ProjectError::InvalidManifest {
                path: manifest_path,
                reason: "the default export must be an object".to_string(),
            });
        }

        let user: UserConfiguration = serde_json::from_value(exported).map_err(|e| ProjectError::InvalidManifest {
            path: manifest_path.clone(),
            reason: e.to_string(),
        })?;

        let name = match user.name {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(ProjectError::NoName(manifest_path)),
        };

        let mut configuration = Self::new(name, manifest_path);
        configuration.plugin_directories = user
            .plugin_directories
            .iter()
            .map(|dir| directory.join(dir))
            .collect();
        configuration.alias = user
            .alias
            .into_iter()
            .map(|(find, target)| (find, directory.join(target)))
            .collect();

        Ok(configuration)
    }

    /// Exact alias rules for the aliases the project declares
    pub fn alias_rules(&self) -> Vec<AliasRule> {
        self.alias
            .iter()
            .map(|(find, target)| AliasRule::exact(find.as_str(), target))
            .collect()
    }
}

/// Finds `gestalt.config.ts` or `gestalt.config.js` in `directory`
pub fn find_manifest(directory: &Path) -> Option<PathBuf> {
    MANIFEST_EXTENSIONS
        .iter()
        .map(|ext| directory.join(format!("{}.{}", MANIFEST_NAME, ext)))
        .find(|path| path.is_file())
}
