//! # Project Model
//!
//! A Gestalt project is a directory with a `gestalt.config.ts` (or `.js`)
//! manifest:
//!
//! ```text
//! my-app/
//! ├── gestalt.config.ts        # name, pluginDirectories, alias
//! ├── node_modules/
//! │   ├── gestaltjs/           # framework (optional)
//! │   └── gestalt-plugin-*/    # plugins
//! └── src/targets/
//!     └── <name>/
//!         ├── target.ts        # platforms
//!         └── routes/          # file-system routes
//! ```
//!
//! [`Project::load`] resolves all of it into one value: manifest, plugins
//! merged into the configuration, targets and their routes.

mod framework;
mod manifest;
mod routes;
mod target;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::plugin::{merge, PluginLoader};
use crate::script::EvaluationError;

pub use framework::{find_framework, framework_aliases, FRAMEWORK_PACKAGE};
pub use manifest::{find_manifest, ProjectConfiguration, MANIFEST_EXTENSIONS, MANIFEST_NAME};
pub use routes::{find_conflicts, load_routes, route_path, Route, RouteConflict, ROUTE_EXTENSIONS};
pub use target::{load_targets, Platform, Target, TARGETS_DIRECTORY};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("The directory {} doesn't exist", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Couldn't find a gestalt.config.ts or gestalt.config.js in {}", .0.display())]
    ManifestNotFound(PathBuf),

    #[error("The project manifest {} doesn't declare a name", .0.display())]
    NoName(PathBuf),

    #[error("The project manifest {} is invalid: {reason}", path.display())]
    InvalidManifest { path: PathBuf, reason: String },

    #[error("The target manifest {} is invalid: {reason}", path.display())]
    InvalidTarget { path: PathBuf, reason: String },

    #[error("Failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// A fully resolved project
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub directory: PathBuf,

    pub configuration: ProjectConfiguration,

    pub targets: Vec<Target>,

    /// Installed framework package, when one was found
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<PathBuf>,
}

impl Project {
    /// Loads the project in `directory`
    pub fn load(directory: impl AsRef<Path>) -> Result<Self> {
        let requested = directory.as_ref();
        let directory =
            fs::canonicalize(requested).map_err(|_| ProjectError::DirectoryNotFound(requested.to_path_buf()))?;
        debug!(directory = %directory.display(), "loading project");

        let framework = find_framework(&directory);
        let framework_rules = match &framework {
            Some(framework) => {
                debug!(framework = %framework.display(), "found framework");
                framework_aliases(&directory, framework).context("Failed to build the framework aliases")?
            }
            None => Vec::new(),
        };

        let configuration = ProjectConfiguration::load(&directory, &framework_rules)?;

        let mut aliases = configuration.alias_rules();
        aliases.extend(framework_rules);

        let mut roots = vec![directory.clone()];
        roots.extend(configuration.plugin_directories.iter().cloned());

        let loader = PluginLoader::new(aliases);
        let mut plugins = loader.discover(&roots)?;
        debug!(count = plugins.len(), "discovered plugins");

        if framework.is_some() {
            plugins.push(loader.load_known_plugin()?);
        } else {
            debug!("no {} package found, skipping the baseline renderer", FRAMEWORK_PACKAGE);
        }

        let configuration = merge(&configuration, &plugins)?;
        let targets = load_targets(&directory, loader.aliases())?;

        info!(
            name = %configuration.name,
            plugins = configuration.plugins.len(),
            targets = targets.len(),
            "project loaded"
        );

        Ok(Self {
            directory,
            configuration,
            targets,
            framework,
        })
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn install_plugin(root: &Path, name: &str, dependencies: serde_json::Value) {
        let dir = root.join("node_modules").join(format!("gestalt-plugin-{}", name));
        write(&dir.join("package.json"), &json!({ "name": format!("gestalt-plugin-{}", name) }).to_string());
        write(
            &dir.join("plugin.js"),
            &format!("export default {{ description: '{}', renderer: {{ dependencies: {} }} }}", name, dependencies),
        );
    }

    #[test]
    fn loads_a_project_without_framework() {
        let project = TempDir::new().unwrap();
        write(&project.path().join("gestalt.config.ts"), r#"export default { name: "shop" }"#);
        install_plugin(project.path(), "react", json!({ "react": "^18.0.0" }));
        write(
            &project.path().join("src/targets/web/target.ts"),
            r#"export default { platforms: ["web"] }"#,
        );

        let loaded = Project::load(project.path()).unwrap();

        assert_eq!(loaded.configuration.name, "shop");
        assert_eq!(loaded.configuration.plugins.len(), 1);
        assert_eq!(loaded.configuration.renderer_dependencies["react"], "^18.0.0");
        assert_eq!(loaded.targets.len(), 1);
        assert!(loaded.framework.is_none());
        assert!(loaded.target("web").is_some());
    }

    #[test]
    fn framework_provides_the_baseline_renderer() {
        let project = TempDir::new().unwrap();
        let framework = project.path().join("node_modules").join(FRAMEWORK_PACKAGE);
        write(
            &framework.join("src/runtime/plugin.ts"),
            "export function definePlugin(plugin) { return plugin }",
        );
        write(
            &framework.join("src/plugins/vue.ts"),
            r#"
            import { definePlugin } from "gestaltjs/plugin"
            export default definePlugin({ description: "Vue", renderer: { dependencies: { vue: "^3.2.0" } } })
            "#,
        );
        write(
            &project.path().join("gestalt.config.ts"),
            r#"export default { name: "shop", pluginDirectories: ["extra"] }"#,
        );
        install_plugin(&project.path().join("extra"), "router", json!({ "vue": "^3.2.0" }));

        let loaded = Project::load(project.path()).unwrap();
        let names: Vec<_> = loaded.configuration.plugins.iter().map(|p| p.name.as_str()).collect();

        assert_eq!(names, ["router", "vue"]);
        assert_eq!(loaded.configuration.renderer_dependencies["vue"], "^3.2.0");
    }

    #[test]
    fn conflicting_plugins_fail() {
        let project = TempDir::new().unwrap();
        write(&project.path().join("gestalt.config.ts"), r#"export default { name: "shop" }"#);
        install_plugin(project.path(), "a", json!({ "vue": "2" }));
        install_plugin(project.path(), "b", json!({ "vue": "3" }));

        let err = Project::load(project.path()).unwrap_err();
        assert!(err.downcast_ref::<crate::plugin::MergeError>().is_some());
    }

    #[test]
    fn missing_directory() {
        let project = TempDir::new().unwrap();
        let err = Project::load(project.path().join("nope")).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ProjectError>(),
            Some(ProjectError::DirectoryNotFound(_))
        ));
    }
}
