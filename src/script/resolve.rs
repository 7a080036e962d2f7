//! Module specifier resolution

use std::fs;
use std::path::{Path, PathBuf};

use super::alias::{self, AliasRule};
use super::EvaluationError;

/// Extensions tried when a specifier names a file without one
pub const EXTENSIONS: &[&str] = &["ts", "mts", "js", "mjs", "json"];

/// Conditions honored in a package.json `exports` map, in order
const EXPORT_CONDITIONS: &[&str] = &["import", "module", "default"];

/// Resolves import specifiers relative to the importing module
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    aliases: Vec<AliasRule>,
}

impl Resolver {
    pub fn new(aliases: Vec<AliasRule>) -> Self {
        Self { aliases }
    }

    /// Resolves `specifier` as imported from the module at `importer`
    ///
    /// Alias rules win over everything else. Bare specifiers are looked up in
    /// the closest `node_modules` that has the package, following its
    /// package.json `exports`, `module` or `main`.
    pub fn resolve(&self, specifier: &str, importer: &Path) -> Result<PathBuf, EvaluationError> {
        if let Some(target) = alias::rewrite(&self.aliases, specifier) {
            return find_module(&target).ok_or_else(|| EvaluationError::UnresolvedAlias {
                path: importer.to_path_buf(),
                specifier: specifier.to_string(),
                target,
            });
        }

        let unresolved = || EvaluationError::UnresolvedImport {
            path: importer.to_path_buf(),
            specifier: specifier.to_string(),
        };

        if specifier.starts_with("node:") {
            return Err(EvaluationError::Unsupported {
                path: importer.to_path_buf(),
                message: format!("'{}' is a Node.js builtin, which isn't available to plugins", specifier),
            });
        }

        let base = importer.parent().unwrap_or_else(|| Path::new("."));

        if specifier.starts_with("./") || specifier.starts_with("../") || Path::new(specifier).is_absolute() {
            return find_module(&base.join(specifier)).ok_or_else(unresolved);
        }

        let package = package_name(specifier).ok_or_else(unresolved)?;
        let subpath = format!(".{}", &specifier[package.len()..]);
        base.ancestors()
            .map(|dir| dir.join("node_modules").join(package))
            .find(|candidate| candidate.is_dir())
            .and_then(|directory| resolve_package(&directory, &subpath))
            .ok_or_else(unresolved)
    }
}

/// Resolves `subpath` (`.` or `./x`) inside an installed package
fn resolve_package(directory: &Path, subpath: &str) -> Option<PathBuf> {
    let manifest: Option<serde_json::Value> = fs::read_to_string(directory.join("package.json"))
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok());

    if let Some(manifest) = &manifest {
        if let Some(exports) = manifest.get("exports") {
            return export_target(exports, subpath).and_then(|target| find_module(&directory.join(target)));
        }
        if subpath == "." {
            let main = ["module", "main"]
                .iter()
                .filter_map(|field| manifest.get(*field).and_then(serde_json::Value::as_str))
                .find_map(|main| find_module(&directory.join(main)));
            if main.is_some() {
                return main;
            }
        }
    }

    if subpath == "." {
        find_module(&directory.join("index"))
    } else {
        find_module(&directory.join(subpath))
    }
}

/// Picks the target of `subpath` in a package.json `exports` field
fn export_target(exports: &serde_json::Value, subpath: &str) -> Option<String> {
    match exports {
        serde_json::Value::Object(map) if map.keys().any(|key| key.starts_with('.')) => {
            if let Some(entry) = map.get(subpath) {
                return condition_target(entry);
            }
            // subpath patterns (`./*`)
            map.iter().find_map(|(key, entry)| {
                let (prefix, suffix) = key.split_once('*')?;
                let matched = subpath.strip_prefix(prefix)?.strip_suffix(suffix)?;
                condition_target(entry).map(|target| target.replace('*', matched))
            })
        }
        sugar if subpath == "." => condition_target(sugar),
        _ => None,
    }
}

fn condition_target(entry: &serde_json::Value) -> Option<String> {
    match entry {
        serde_json::Value::String(target) => Some(target.clone()),
        serde_json::Value::Object(conditions) => EXPORT_CONDITIONS
            .iter()
            .filter_map(|condition| conditions.get(*condition))
            .find_map(condition_target),
        serde_json::Value::Array(fallbacks) => fallbacks.iter().find_map(condition_target),
        _ => None,
    }
}

/// Returns the package portion of a bare specifier (`@scope/name` or `name`)
fn package_name(specifier: &str) -> Option<&str> {
    if specifier.is_empty() {
        return None;
    }

    let mut separators = specifier.match_indices('/').map(|(i, _)| i);
    let end = if specifier.starts_with('@') {
        separators.nth(1)
    } else {
        separators.next()
    };

    match end {
        Some(end) => Some(&specifier[..end]),
        None if specifier.starts_with('@') && !specifier.contains('/') => None,
        None => Some(specifier),
    }
}

/// Finds the file a path refers to, trying extensions and directory indexes
pub fn find_module(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }

    // TypeScript sources import their siblings with the emitted `.js` extension
    if path.extension().is_some_and(|ext| ext == "js") {
        let ts = path.with_extension("ts");
        if ts.is_file() {
            return Some(ts);
        }
    }

    let with_extension = |base: &Path, ext: &str| {
        let mut file = base.as_os_str().to_os_string();
        file.push(".");
        file.push(ext);
        PathBuf::from(file)
    };

    EXTENSIONS
        .iter()
        .map(|ext| with_extension(path, ext))
        .chain(EXTENSIONS.iter().map(|ext| path.join(format!("index.{}", ext))))
        .find(|candidate| candidate.is_file())
}
