//! Canonical plugin records

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{DiscoveryError, PluginIdentity};

/// Integration with a UI technology (e.g., Vue or React)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renderer {
    /// Packages the renderer needs, mapped to version constraints
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

/// A discovered and normalized plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plugin {
    /// Package name without the `gestalt-plugin-` prefix
    pub name: String,

    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub renderer: Option<Renderer>,
}

/// The shape of a plugin module's default export
#[derive(Debug, Deserialize)]
struct PluginDefinition {
    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    renderer: Option<Renderer>,
}

/// Builds the canonical plugin from its identity and exported definition
pub fn normalize(identity: &PluginIdentity, definition: serde_json::Value) -> Result<Plugin, DiscoveryError> {
    let invalid = |reason: String| DiscoveryError::InvalidDefinition {
        directory: identity.directory.clone(),
        reason,
    };

    if !definition.is_object() {
        return Err(invalid(format!(
            "the default export must be an object, found {}",
            json_type(&definition)
        )));
    }

    let definition: PluginDefinition = serde_json::from_value(definition).map_err(|e| invalid(e.to_string()))?;

    Ok(Plugin {
        name: identity.short_name.clone(),
        description: definition.description.unwrap_or_default(),
        renderer: definition.renderer,
    })
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
