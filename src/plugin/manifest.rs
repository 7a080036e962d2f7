//! Plugin package validation
//!
//! A plugin is identified by the `name` in its `package.json`, not by the
//! name of the directory it was installed into.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{DiscoveryError, PLUGIN_PREFIX};

/// Identity of a validated plugin package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginIdentity {
    /// The `name` field of the package.json (e.g., "gestalt-plugin-vue")
    pub raw_name: String,

    /// The name without the plugin prefix (e.g., "vue")
    pub short_name: String,

    /// Directory containing the package
    pub directory: PathBuf,
}

impl PluginIdentity {
    pub fn new(raw_name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        let raw_name = raw_name.into();
        Self {
            short_name: short_name(&raw_name).to_string(),
            raw_name,
            directory: directory.into(),
        }
    }
}

/// Strips the plugin prefix from a package name when present
pub fn short_name(raw_name: &str) -> &str {
    raw_name.strip_prefix(PLUGIN_PREFIX).unwrap_or(raw_name)
}

/// Validates the package descriptor in `directory`
pub fn validate(directory: &Path) -> Result<PluginIdentity, DiscoveryError> {
    let path = directory.join("package.json");

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(DiscoveryError::PackageJsonNotFound(directory.to_path_buf()));
        }
        Err(source) => return Err(DiscoveryError::Io { path, source }),
    };

    let package: serde_json::Value =
        serde_json::from_str(&content).map_err(|source| DiscoveryError::InvalidPackageJson {
            path: path.clone(),
            source,
        })?;

    let raw_name = package
        .get("name")
        .and_then(serde_json::Value::as_str)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| DiscoveryError::NoNameInPackageJson(directory.to_path_buf()))?;

    Ok(PluginIdentity::new(raw_name, directory))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn write_package(dir: &TempDir, content: &str) {
        fs::write(dir.path().join("package.json"), content).unwrap();
    }

    #[test]
    fn valid_package() {
        let dir = TempDir::new().unwrap();
        write_package(&dir, r#"{"name": "gestalt-plugin-vue", "version": "1.0.0"}"#);

        let identity = validate(dir.path()).unwrap();

        assert_eq!(identity.raw_name, "gestalt-plugin-vue");
        assert_eq!(identity.short_name, "vue");
        assert_eq!(identity.directory, dir.path());
    }

    #[test]
    fn name_without_prefix_is_kept() {
        let dir = TempDir::new().unwrap();
        write_package(&dir, r#"{"name": "@acme/renderer"}"#);

        assert_eq!(validate(dir.path()).unwrap().short_name, "@acme/renderer");
    }

    #[test]
    fn missing_package_json() {
        let dir = TempDir::new().unwrap();

        let err = validate(dir.path()).unwrap_err();
        assert!(matches!(err, DiscoveryError::PackageJsonNotFound(ref d) if d == dir.path()));
    }

    #[test]
    fn missing_or_empty_name() {
        for content in [r#"{}"#, r#"{"name": ""}"#, r#"{"name": 42}"#, "[]"] {
            let dir = TempDir::new().unwrap();
            write_package(&dir, content);

            let err = validate(dir.path()).unwrap_err();
            assert!(
                matches!(err, DiscoveryError::NoNameInPackageJson(ref d) if d == dir.path()),
                "unexpected result for {}: {:?}",
                content,
                err
            );
        }
    }

    #[test]
    fn malformed_package_json() {
        let dir = TempDir::new().unwrap();
        write_package(&dir, "{ name: ");

        assert!(matches!(
            validate(dir.path()),
            Err(DiscoveryError::InvalidPackageJson { .. })
        ));
    }

    proptest! {
        #[test]
        fn prefix_is_stripped_exactly_once(name in "[a-z][a-z0-9-]{0,20}") {
            let raw = format!("{}{}", PLUGIN_PREFIX, name);
            prop_assert_eq!(short_name(&raw), name.as_str());
        }

        #[test]
        fn names_without_prefix_are_unchanged(name in "[a-z][a-z0-9-]{0,20}") {
            prop_assume!(!name.starts_with(PLUGIN_PREFIX));
            prop_assert_eq!(short_name(&name), name.as_str());
        }
    }
}
