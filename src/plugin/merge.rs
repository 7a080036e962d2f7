//! Folding discovered plugins into the project configuration

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use thiserror::Error;

use crate::project::ProjectConfiguration;

use super::Plugin;

/// A version requirement and who declared it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Plugin name, or the project name for requirements already present
    pub source: String,
    pub version: String,
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.source, self.version)
    }
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(
        "Conflicting versions of the renderer dependency '{name}': {}",
        constraints.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    DependencyVersionConflict { name: String, constraints: Vec<Constraint> },

    #[error("The plugin '{0}' is registered more than once")]
    DuplicatePlugin(String),
}

/// Returns `configuration` with `plugins` registered
///
/// Plugins end up sorted by name. Renderer dependencies are unioned; two
/// different version strings for the same package are a conflict. When
/// several packages conflict, the first by package name is reported.
pub fn merge(configuration: &ProjectConfiguration, plugins: &[Plugin]) -> Result<ProjectConfiguration, MergeError> {
    let mut names: HashSet<&str> = configuration.plugins.iter().map(|p| p.name.as_str()).collect();
    for plugin in plugins {
        if !names.insert(plugin.name.as_str()) {
            return Err(MergeError::DuplicatePlugin(plugin.name.clone()));
        }
    }

    let mut incoming: Vec<&Plugin> = plugins.iter().collect();
    incoming.sort_by(|a, b| a.name.cmp(&b.name));

    let mut declared: BTreeMap<&str, Vec<Constraint>> = BTreeMap::new();
    for (name, version) in &configuration.renderer_dependencies {
        declared.entry(name).or_default().push(Constraint {
            source: configuration.name.clone(),
            version: version.clone(),
        });
    }
    for plugin in &incoming {
        let Some(renderer) = &plugin.renderer else {
            continue;
        };
        for (name, version) in &renderer.dependencies {
            declared.entry(name).or_default().push(Constraint {
                source: plugin.name.clone(),
                version: version.clone(),
            });
        }
    }

    let mut renderer_dependencies = BTreeMap::new();
    for (name, constraints) in declared {
        let version = &constraints[0].version;
        if constraints.iter().any(|c| &c.version != version) {
            return Err(MergeError::DependencyVersionConflict {
                name: name.to_string(),
                constraints,
            });
        }
        renderer_dependencies.insert(name.to_string(), version.clone());
    }

    let mut merged = configuration.clone();
    merged.plugins.extend(incoming.into_iter().cloned());
    merged.plugins.sort_by(|a, b| a.name.cmp(&b.name));
    merged.renderer_dependencies = renderer_dependencies;

    Ok(merged)
}
