//! Locating the installed framework and its import aliases

use std::path::{Path, PathBuf};

use crate::plugin::BASELINE_RENDERER_SPECIFIER;
use crate::script::AliasRule;

/// Package name of the framework
pub const FRAMEWORK_PACKAGE: &str = "gestaltjs";

/// Finds the framework package in the nearest ancestor `node_modules`
pub fn find_framework(directory: &Path) -> Option<PathBuf> {
    directory
        .ancestors()
        .map(|dir| dir.join("node_modules").join(FRAMEWORK_PACKAGE))
        .find(|candidate| candidate.is_dir())
}

/// Alias rules that point framework specifiers at its sources
pub fn framework_aliases(project: &Path, framework: &Path) -> Result<Vec<AliasRule>, regex::Error> {
    let packages = framework.parent().unwrap_or(framework);

    Ok(vec![
        AliasRule::exact("gestaltjs/plugin", framework.join("src/runtime/plugin.ts")),
        AliasRule::exact(BASELINE_RENDERER_SPECIFIER, framework.join("src/plugins/vue.ts")),
        AliasRule::pattern(
            r"^@gestaltjs/(.+)/(.+)/(.+)$",
            format!("{}/${{1}}/src/${{2}}/${{3}}.ts", replacement_path(packages)),
        )?,
        AliasRule::pattern(r"^\$(.*)$", format!("{}/src/${{1}}.ts", replacement_path(project)))?,
    ])
}

/// Escapes `$` so a path can be embedded in a regex replacement
fn replacement_path(path: &Path) -> String {
    path.to_string_lossy().replace('$', "$$")
}
