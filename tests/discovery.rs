//! Plugin discovery tests against on-disk fixtures

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use gestalt_cli::plugin::{
    discover, load_known_plugin, merge, DiscoveryError, DiscoveryOptions, MergeError, Plugin, Renderer,
};
use gestalt_cli::project::ProjectConfiguration;
use gestalt_cli::script::AliasRule;
use tempfile::TempDir;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Creates `node_modules/<directory>` with a package.json named `name`
fn plugin_dir(root: &Path, directory: &str, name: Option<&str>) -> PathBuf {
    let dir = root.join("node_modules").join(directory);
    fs::create_dir_all(&dir).unwrap();
    if let Some(name) = name {
        write(&dir.join("package.json"), &format!(r#"{{"name": "{}"}}"#, name));
    }
    dir
}

fn names(plugins: &[Plugin]) -> BTreeSet<&str> {
    plugins.iter().map(|p| p.name.as_str()).collect()
}

fn roots(dir: &TempDir) -> Vec<PathBuf> {
    vec![dir.path().to_path_buf()]
}

#[test]
fn typescript_entry_module() {
    let project = TempDir::new().unwrap();
    let dir = plugin_dir(project.path(), "gestalt-plugin-test", Some("gestalt-plugin-test"));
    write(
        &dir.join("plugin.ts"),
        r#"
        interface Definition { description?: string }
        const plugin: Definition = { description: "A test plugin" }
        export default plugin
        "#,
    );

    let plugins = discover(&roots(&project), &DiscoveryOptions::default()).unwrap();

    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].name, "test");
    assert_eq!(plugins[0].description, "A test plugin");
}

#[test]
fn javascript_entry_module() {
    let project = TempDir::new().unwrap();
    let dir = plugin_dir(project.path(), "gestalt-plugin-test", Some("gestalt-plugin-test"));
    write(&dir.join("plugin.js"), "export default {}");

    let plugins = discover(&roots(&project), &DiscoveryOptions::default()).unwrap();

    assert_eq!(plugins.len(), 1);
    assert_eq!(plugins[0].name, "test");
    assert_eq!(plugins[0].description, "");
}

#[test]
fn several_plugins_under_one_root() {
    let project = TempDir::new().unwrap();
    for name in ["a", "b"] {
        let package = format!("gestalt-plugin-{}", name);
        let dir = plugin_dir(project.path(), &package, Some(&package));
        write(&dir.join("plugin.ts"), "export default {}");
    }

    let plugins = discover(&roots(&project), &DiscoveryOptions::default()).unwrap();

    assert_eq!(names(&plugins), BTreeSet::from(["a", "b"]));
}

#[test]
fn missing_package_json() {
    let project = TempDir::new().unwrap();
    let dir = plugin_dir(project.path(), "gestalt-plugin-test", None);
    write(&dir.join("plugin.ts"), "export default {}");

    let err = discover(&roots(&project), &DiscoveryOptions::default()).unwrap_err();

    assert!(matches!(err, DiscoveryError::PackageJsonNotFound(ref d) if d == &dir));
}

#[test]
fn package_json_without_name() {
    let project = TempDir::new().unwrap();
    let dir = plugin_dir(project.path(), "gestalt-plugin-test", None);
    write(&dir.join("package.json"), r#"{"version": "1.0.0"}"#);
    write(&dir.join("plugin.ts"), "export default {}");

    let err = discover(&roots(&project), &DiscoveryOptions::default()).unwrap_err();

    assert!(matches!(err, DiscoveryError::NoNameInPackageJson(ref d) if d == &dir));
}

#[test]
fn missing_entry_module() {
    let project = TempDir::new().unwrap();
    let dir = plugin_dir(project.path(), "gestalt-plugin-test", Some("gestalt-plugin-test"));
    write(&dir.join("index.js"), "export default {}");

    let err = discover(&roots(&project), &DiscoveryOptions::default()).unwrap_err();

    assert!(matches!(err, DiscoveryError::EntryModuleNotFound(ref d) if d == &dir));
}

#[test]
fn same_short_name_collides() {
    let project = TempDir::new().unwrap();
    for directory in ["gestalt-plugin-one", "gestalt-plugin-two"] {
        let dir = plugin_dir(project.path(), directory, Some("gestalt-plugin-same"));
        write(&dir.join("plugin.js"), "export default {}");
    }

    let err = discover(&roots(&project), &DiscoveryOptions::default()).unwrap_err();

    assert!(matches!(err, DiscoveryError::NameCollision { ref name, .. } if name == "same"));
}

#[test]
fn aliased_virtual_import() {
    let project = TempDir::new().unwrap();
    let shared = project.path().join("shared").join("renderer.ts");
    write(&shared, r#"export const dependencies = { "test": "1.2.3" }"#);

    let dir = plugin_dir(project.path(), "gestalt-plugin-test", Some("gestalt-plugin-test"));
    write(
        &dir.join("plugin.ts"),
        r#"
        import { dependencies } from "virtual:renderer"

        export default {
          description: "Uses a virtual module",
          renderer: { dependencies },
        }
        "#,
    );

    let options = DiscoveryOptions {
        alias_rules: vec![AliasRule::exact("virtual:renderer", &shared)],
    };
    let plugins = discover(&roots(&project), &options).unwrap();

    let expected: BTreeMap<String, String> = BTreeMap::from([("test".to_string(), "1.2.3".to_string())]);
    assert_eq!(plugins[0].renderer.as_ref().unwrap().dependencies, expected);
}

#[test]
fn pattern_alias_with_capture() {
    let project = TempDir::new().unwrap();
    write(
        &project.path().join("lib").join("versions.ts"),
        r#"export default { vue: "^3.2.0" }"#,
    );

    let dir = plugin_dir(project.path(), "gestalt-plugin-vue", Some("gestalt-plugin-vue"));
    write(
        &dir.join("plugin.ts"),
        r#"
        import versions from "@lib/versions"
        export default { renderer: { dependencies: versions } }
        "#,
    );

    let replacement = format!("{}/lib/$1.ts", project.path().display());
    let options = DiscoveryOptions {
        alias_rules: vec![AliasRule::pattern(r"^@lib/(.+)$", replacement).unwrap()],
    };
    let plugins = discover(&roots(&project), &options).unwrap();

    assert_eq!(plugins[0].renderer.as_ref().unwrap().dependencies["vue"], "^3.2.0");
}

#[test]
fn unresolvable_import_is_an_evaluation_error() {
    let project = TempDir::new().unwrap();
    let dir = plugin_dir(project.path(), "gestalt-plugin-test", Some("gestalt-plugin-test"));
    write(&dir.join("plugin.ts"), r#"import x from "virtual:missing"; export default x"#);

    let err = discover(&roots(&project), &DiscoveryOptions::default()).unwrap_err();

    assert!(matches!(err, DiscoveryError::Evaluation(_)));
}

#[test]
fn entry_modules_run_as_javascript() {
    let project = TempDir::new().unwrap();
    let dir = plugin_dir(project.path(), "gestalt-plugin-test", Some("gestalt-plugin-test"));
    write(
        &dir.join("plugin.ts"),
        r#"
        const definePlugin = (options: { major: number }) => {
          const key: string = "vue"
          const range = options.major > 2 ? "^" + options.major + ".2.0" : "^2.6.0"
          return {
            description: `Renders with Vue ${options.major}`,
            renderer: { dependencies: { [key]: range } },
          }
        }

        export default definePlugin({ major: 3 })
        "#,
    );

    let plugins = discover(&roots(&project), &DiscoveryOptions::default()).unwrap();

    assert_eq!(plugins[0].description, "Renders with Vue 3");
    assert_eq!(plugins[0].renderer.as_ref().unwrap().dependencies["vue"], "^3.2.0");
}

#[test]
fn deeply_nested_exports_fail_cleanly() {
    let project = TempDir::new().unwrap();
    let dir = plugin_dir(project.path(), "gestalt-plugin-test", Some("gestalt-plugin-test"));
    let nested = format!("{}{}", "[".repeat(20_000), "]".repeat(20_000));
    write(&dir.join("plugin.js"), &format!("export default {{ renderer: {} }}", nested));

    let err = discover(&roots(&project), &DiscoveryOptions::default()).unwrap_err();

    assert!(matches!(err, DiscoveryError::Evaluation(_)));
}

#[test]
fn baseline_renderer_through_aliases() {
    let framework = TempDir::new().unwrap();
    let vue = framework.path().join("src").join("plugins").join("vue.ts");
    write(&vue, r#"export default { description: "Vue", renderer: { dependencies: { vue: "^3.2.0" } } }"#);

    let plugin = load_known_plugin(&[AliasRule::exact("gestaltjs/plugins/vue", &vue)]).unwrap();

    assert_eq!(plugin.name, "vue");
    assert_eq!(plugin.renderer.unwrap().dependencies["vue"], "^3.2.0");
}

fn with_dependencies(name: &str, dependencies: &[(&str, &str)]) -> Plugin {
    Plugin {
        name: name.to_string(),
        description: String::new(),
        renderer: Some(Renderer {
            dependencies: dependencies
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }),
    }
}

#[test]
fn disjoint_merges_union() {
    let configuration = ProjectConfiguration::new("app", "/app/gestalt.config.ts");
    let merged = merge(
        &configuration,
        &[
            with_dependencies("vue", &[("vue", "^3.2.0")]),
            with_dependencies("router", &[("vue-router", "^4.0.0")]),
        ],
    )
    .unwrap();

    assert_eq!(merged.renderer_dependencies.len(), 2);
    assert_eq!(merged.plugins.len(), 2);
    assert!(configuration.plugins.is_empty());
}

#[test]
fn conflicting_versions() {
    let configuration = ProjectConfiguration::new("app", "/app/gestalt.config.ts");
    let err = merge(
        &configuration,
        &[
            with_dependencies("one", &[("vue", "^3.2.0")]),
            with_dependencies("two", &[("vue", "^2.6.0")]),
        ],
    )
    .unwrap_err();

    match err {
        MergeError::DependencyVersionConflict { name, constraints } => {
            assert_eq!(name, "vue");
            assert_eq!(constraints.len(), 2);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
