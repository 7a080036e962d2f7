//! Project targets (`src/targets/<name>/target.ts`)

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::script::{self, AliasRule};

use super::routes::{load_routes, Route};
use super::ProjectError;

/// Directory holding the targets, relative to the project
pub const TARGETS_DIRECTORY: &str = "src/targets";

/// Base name of a target manifest
pub const TARGET_MANIFEST_NAME: &str = "target";

/// Platforms a target can be built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Web,
    Desktop,
    Ios,
    Android,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Platform::Web => "web",
            Platform::Desktop => "desktop",
            Platform::Ios => "ios",
            Platform::Android => "android",
        };
        f.write_str(name)
    }
}

/// A main target of the project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub name: String,
    pub platforms: Vec<Platform>,
    pub directory: PathBuf,
    pub manifest_path: PathBuf,
    pub routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct UserTarget {
    platforms: Vec<Platform>,
}

/// Loads every target of the project in `project_dir`, sorted by name
///
/// Directories without a target manifest are skipped.
pub fn load_targets(project_dir: &Path, aliases: &[AliasRule]) -> Result<Vec<Target>, ProjectError> {
    let targets_dir = project_dir.join(TARGETS_DIRECTORY);

    let entries = match fs::read_dir(&targets_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ProjectError::Io {
                path: targets_dir,
                source,
            })
        }
    };

    let mut targets = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ProjectError::Io {
            path: targets_dir.clone(),
            source,
        })?;

        let directory = entry.path();
        if !directory.is_dir() {
            continue;
        }

        let Some(manifest_path) = find_target_manifest(&directory) else {
            tracing::debug!(directory = %directory.display(), "skipping directory without a target manifest");
            continue;
        };

        let name = entry.file_name().to_string_lossy().into_owned();
        targets.push(load_target(name, directory, manifest_path, aliases)?);
    }

    targets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(targets)
}

fn find_target_manifest(directory: &Path) -> Option<PathBuf> {
    ["ts", "js"]
        .iter()
        .map(|ext| directory.join(format!("{}.{}", TARGET_MANIFEST_NAME, ext)))
        .find(|path| path.is_file())
}

fn load_target(
    name: String,
    directory: PathBuf,
    manifest_path: PathBuf,
    aliases: &[AliasRule],
) -> Result<Target, ProjectError> {
    let invalid = |reason: String| ProjectError::InvalidTarget {
        path: manifest_path.clone(),
        reason,
    };

    let exported = script::evaluate_default_export(&manifest_path, aliases)?;
    if !exported.is_object() {
        return Err(invalid("the default export must be an object".to_string()));
    }

    let user: UserTarget = serde_json::from_value(exported).map_err(|e| invalid(e.to_string()))?;

    let mut platforms = user.platforms;
    platforms.sort();
    platforms.dedup();
    if platforms.is_empty() {
        return Err(invalid("a target must declare at least one platform".to_string()));
    }

    let routes = load_routes(&directory.join("routes"))?;

    Ok(Target {
        name,
        platforms,
        directory,
        manifest_path,
        routes,
    })
}
