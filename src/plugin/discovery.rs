//! Plugin discovery across project roots

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use thiserror::Error;

use crate::script::{self, AliasRule, EvaluationError};

use super::loader::{load_entry_module, ModuleEvaluator, ScriptEvaluator};
use super::manifest::{validate, PluginIdentity};
use super::normalize::{normalize, Plugin};
use super::{ENTRY_MODULE_NAME, PLUGIN_PREFIX};

/// Specifier of the renderer plugin every project falls back on
pub const BASELINE_RENDERER_SPECIFIER: &str = "gestaltjs/plugins/vue";

/// Short name of the baseline renderer plugin
pub const BASELINE_RENDERER_NAME: &str = "vue";

/// Upper bound on the threads loading plugins at once
const MAX_WORKERS: usize = 8;

/// Errors raised while discovering plugins
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Couldn't find a package.json in the plugin directory {}", .0.display())]
    PackageJsonNotFound(PathBuf),

    #[error("Couldn't parse {}", path.display())]
    InvalidPackageJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("The package.json in the plugin directory {} doesn't have a name", .0.display())]
    NoNameInPackageJson(PathBuf),

    #[error(
        "Couldn't find a {name}.ts or {name}.js module in the plugin directory {}",
        .0.display(),
        name = ENTRY_MODULE_NAME
    )]
    EntryModuleNotFound(PathBuf),

    #[error("Two plugins are named '{name}': {} and {}", first.display(), second.display())]
    NameCollision {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("The plugin in {} has an invalid definition: {reason}", directory.display())]
    InvalidDefinition { directory: PathBuf, reason: String },

    #[error("Failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Options for [`discover`]
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Applied to every import while evaluating plugin modules
    pub alias_rules: Vec<AliasRule>,
}

/// Discovers every plugin installed under `roots`
///
/// Each root contributes the `gestalt-plugin-*` directories of its
/// `node_modules`. A root without `node_modules` contributes nothing. A
/// directory reached from several roots is loaded once.
pub fn discover(roots: &[PathBuf], options: &DiscoveryOptions) -> Result<Vec<Plugin>, DiscoveryError> {
    PluginLoader::new(options.alias_rules.clone()).discover(roots)
}

/// Loads the baseline renderer plugin through the alias rules
pub fn load_known_plugin(alias_rules: &[AliasRule]) -> Result<Plugin, DiscoveryError> {
    PluginLoader::new(alias_rules.to_vec()).load_known_plugin()
}

/// Discovers, validates and loads plugins
#[derive(Clone)]
pub struct PluginLoader {
    aliases: Vec<AliasRule>,
    evaluator: Arc<dyn ModuleEvaluator>,
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader").field("aliases", &self.aliases).finish_non_exhaustive()
    }
}

impl PluginLoader {
    pub fn new(aliases: Vec<AliasRule>) -> Self {
        Self {
            aliases,
            evaluator: Arc::new(ScriptEvaluator),
        }
    }

    /// Replaces the module evaluator
    pub fn with_evaluator(mut self, evaluator: impl ModuleEvaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    pub fn aliases(&self) -> &[AliasRule] {
        &self.aliases
    }

    /// Lists candidate plugin directories under `roots`, deduplicated
    pub fn candidates(&self, roots: &[PathBuf]) -> Result<Vec<PathBuf>, DiscoveryError> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for root in roots {
            for directory in scan_root(root)? {
                let canonical = fs::canonicalize(&directory).map_err(|source| DiscoveryError::Io {
                    path: directory.clone(),
                    source,
                })?;
                if seen.insert(canonical) {
                    candidates.push(directory);
                }
            }
        }

        Ok(candidates)
    }

    /// Validates, evaluates and normalizes the plugin in `directory`
    pub fn load(&self, directory: &Path) -> Result<Plugin, DiscoveryError> {
        let identity = validate(directory)?;
        let definition = load_entry_module(directory, &self.aliases, self.evaluator.as_ref())?;
        normalize(&identity, definition)
    }

    /// Discovers every plugin under `roots`
    ///
    /// Candidates load concurrently. Results are reduced in candidate order,
    /// so the reported error is the same from run to run.
    pub fn discover(&self, roots: &[PathBuf]) -> Result<Vec<Plugin>, DiscoveryError> {
        let candidates = self.candidates(roots)?;
        let results = self.load_all(&candidates);

        let mut names: HashMap<String, PathBuf> = HashMap::new();
        let mut plugins = Vec::with_capacity(results.len());

        for (directory, result) in candidates.iter().zip(results) {
            let plugin = result?;
            if let Some(first) = names.insert(plugin.name.clone(), directory.clone()) {
                return Err(DiscoveryError::NameCollision {
                    name: plugin.name,
                    first,
                    second: directory.clone(),
                });
            }
            plugins.push(plugin);
        }

        Ok(plugins)
    }

    /// Loads `candidates` on at most [`MAX_WORKERS`] threads, returning the
    /// results in candidate order
    fn load_all(&self, candidates: &[PathBuf]) -> Vec<Result<Plugin, DiscoveryError>> {
        let workers = thread::available_parallelism()
            .map_or(1, NonZeroUsize::get)
            .min(MAX_WORKERS)
            .min(candidates.len());
        if workers <= 1 {
            return candidates.iter().map(|directory| self.load(directory)).collect();
        }

        let next = AtomicUsize::new(0);
        let mut slots: Vec<Option<Result<Plugin, DiscoveryError>>> = candidates.iter().map(|_| None).collect();

        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(|| {
                        let mut loaded = Vec::new();
                        loop {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            let Some(directory) = candidates.get(index) else {
                                break;
                            };
                            loaded.push((index, self.load(directory)));
                        }
                        loaded
                    })
                })
                .collect();

            for handle in handles {
                let loaded = handle.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic));
                for (index, result) in loaded {
                    slots[index] = Some(result);
                }
            }
        });

        slots.into_iter().flatten().collect()
    }

    /// Loads the baseline renderer plugin
    ///
    /// The entry module is found by rewriting [`BASELINE_RENDERER_SPECIFIER`]
    /// through the alias rules rather than by scanning `node_modules`.
    pub fn load_known_plugin(&self) -> Result<Plugin, DiscoveryError> {
        let entry = script::rewrite(&self.aliases, BASELINE_RENDERER_SPECIFIER)
            .and_then(|path| script::find_module(&path))
            .ok_or_else(|| DiscoveryError::EntryModuleNotFound(PathBuf::from(BASELINE_RENDERER_SPECIFIER)))?;

        let definition = self.evaluator.default_export(&entry, &self.aliases)?;

        let directory = entry.parent().map(Path::to_path_buf).unwrap_or_default();
        let identity = PluginIdentity::new(format!("{}{}", PLUGIN_PREFIX, BASELINE_RENDERER_NAME), directory);

        normalize(&identity, definition)
    }
}

/// Lists the `gestalt-plugin-*` directories in `<root>/node_modules`, sorted
fn scan_root(root: &Path) -> Result<Vec<PathBuf>, DiscoveryError> {
    let node_modules = root.join("node_modules");

    let entries = match fs::read_dir(&node_modules) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(DiscoveryError::Io {
                path: node_modules,
                source,
            })
        }
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::Io {
            path: node_modules.clone(),
            source,
        })?;

        let is_plugin = entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with(PLUGIN_PREFIX))
            .unwrap_or(false);

        let path = entry.path();
        if is_plugin && path.is_dir() {
            found.push(path);
        }
    }

    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn install(root: &Path, directory: &str, package_name: &str) -> PathBuf {
        let dir = root.join("node_modules").join(directory);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("package.json"), json!({ "name": package_name }).to_string()).unwrap();
        fs::write(dir.join("plugin.ts"), "export default {}").unwrap();
        dir
    }

    struct Counting(AtomicUsize);

    impl ModuleEvaluator for Counting {
        fn default_export(&self, _: &Path, _: &[AliasRule]) -> Result<serde_json::Value, EvaluationError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "description": "counted" }))
        }
    }

    /// Records the most evaluations that were running at once
    #[derive(Default)]
    struct Overlap {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ModuleEvaluator for Arc<Overlap> {
        fn default_export(&self, _: &Path, _: &[AliasRule]) -> Result<serde_json::Value, EvaluationError> {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(5));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(json!({ "description": "overlap" }))
        }
    }

    #[test]
    fn root_without_node_modules_is_empty() {
        let root = TempDir::new().unwrap();

        let plugins = discover(&[root.path().to_path_buf()], &DiscoveryOptions::default()).unwrap();
        assert!(plugins.is_empty());
    }

    #[test]
    fn ignores_unprefixed_directories_and_files() {
        let root = TempDir::new().unwrap();
        install(root.path(), "vue", "vue");
        fs::write(root.path().join("node_modules").join("gestalt-plugin-file"), "").unwrap();

        let loader = PluginLoader::new(Vec::new());
        assert!(loader.candidates(&[root.path().to_path_buf()]).unwrap().is_empty());
    }

    #[test]
    fn candidates_are_sorted_per_root() {
        let root = TempDir::new().unwrap();
        let b = install(root.path(), "gestalt-plugin-b", "gestalt-plugin-b");
        let a = install(root.path(), "gestalt-plugin-a", "gestalt-plugin-a");

        let loader = PluginLoader::new(Vec::new());
        assert_eq!(loader.candidates(&[root.path().to_path_buf()]).unwrap(), vec![a, b]);
    }

    #[test]
    fn same_root_twice_loads_once() {
        let root = TempDir::new().unwrap();
        install(root.path(), "gestalt-plugin-a", "gestalt-plugin-a");

        let loader = PluginLoader::new(Vec::new()).with_evaluator(Counting(AtomicUsize::new(0)));
        let roots = vec![root.path().to_path_buf(), root.path().to_path_buf()];
        let plugins = loader.discover(&roots).unwrap();

        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].description, "counted");
    }

    #[test]
    fn name_comes_from_package_json() {
        let root = TempDir::new().unwrap();
        install(root.path(), "gestalt-plugin-folder", "gestalt-plugin-react");

        let plugins = discover(&[root.path().to_path_buf()], &DiscoveryOptions::default()).unwrap();
        assert_eq!(plugins[0].name, "react");
    }

    #[test]
    fn collisions_across_roots_fail() {
        let first_root = TempDir::new().unwrap();
        let second_root = TempDir::new().unwrap();
        let first = install(first_root.path(), "gestalt-plugin-x", "gestalt-plugin-x");
        let second = install(second_root.path(), "gestalt-plugin-y", "gestalt-plugin-x");

        let roots = vec![first_root.path().to_path_buf(), second_root.path().to_path_buf()];
        let err = discover(&roots, &DiscoveryOptions::default()).unwrap_err();

        match err {
            DiscoveryError::NameCollision {
                name,
                first: a,
                second: b,
            } => {
                assert_eq!(name, "x");
                assert_eq!(a, first);
                assert_eq!(b, second);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn first_failing_candidate_is_reported() {
        let root = TempDir::new().unwrap();
        let a = root.path().join("node_modules").join("gestalt-plugin-a");
        let b = root.path().join("node_modules").join("gestalt-plugin-b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        fs::write(b.join("package.json"), "{}").unwrap();

        for _ in 0..5 {
            let err = discover(&[root.path().to_path_buf()], &DiscoveryOptions::default()).unwrap_err();
            assert!(matches!(err, DiscoveryError::PackageJsonNotFound(ref d) if d == &a));
        }
    }

    #[test]
    fn many_candidates_load_on_bounded_workers_in_order() {
        let root = TempDir::new().unwrap();
        let expected: Vec<String> = (0..40).map(|i| format!("p{:02}", i)).collect();
        for name in &expected {
            let package = format!("gestalt-plugin-{}", name);
            install(root.path(), &package, &package);
        }

        let overlap = Arc::new(Overlap::default());
        let loader = PluginLoader::new(Vec::new()).with_evaluator(Arc::clone(&overlap));
        let plugins = loader.discover(&[root.path().to_path_buf()]).unwrap();

        let names: Vec<_> = plugins.iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, expected);
        let peak = overlap.peak.load(Ordering::SeqCst);
        assert!((1..=MAX_WORKERS).contains(&peak), "peak concurrency {}", peak);
    }

    #[cfg(unix)]
    #[test]
    fn node_modules_read_errors_propagate() {
        let root = TempDir::new().unwrap();
        let node_modules = root.path().join("node_modules");
        fs::write(&node_modules, "not a directory").unwrap();

        let err = discover(&[root.path().to_path_buf()], &DiscoveryOptions::default()).unwrap_err();
        assert!(matches!(err, DiscoveryError::Io { ref path, .. } if path == &node_modules));
    }

    #[cfg(unix)]
    #[test]
    fn package_json_read_errors_propagate() {
        let root = TempDir::new().unwrap();
        let package_json = root.path().join("node_modules/gestalt-plugin-a/package.json");
        fs::create_dir_all(&package_json).unwrap();

        let err = discover(&[root.path().to_path_buf()], &DiscoveryOptions::default()).unwrap_err();
        assert!(matches!(err, DiscoveryError::Io { ref path, .. } if path == &package_json));
    }

    #[test]
    fn known_plugin_follows_aliases() {
        let framework = TempDir::new().unwrap();
        let plugins_dir = framework.path().join("src").join("plugins");
        fs::create_dir_all(&plugins_dir).unwrap();
        fs::write(
            plugins_dir.join("vue.ts"),
            r#"export default { description: "Vue", renderer: { dependencies: { vue: "^3.2.0" } } }"#,
        )
        .unwrap();

        let aliases = vec![AliasRule::exact(BASELINE_RENDERER_SPECIFIER, plugins_dir.join("vue.ts"))];
        let plugin = load_known_plugin(&aliases).unwrap();

        assert_eq!(plugin.name, "vue");
        assert_eq!(plugin.description, "Vue");
        assert_eq!(plugin.renderer.unwrap().dependencies["vue"], "^3.2.0");
    }

    #[test]
    fn known_plugin_without_alias_is_not_found() {
        let err = load_known_plugin(&[]).unwrap_err();
        assert!(matches!(err, DiscoveryError::EntryModuleNotFound(_)));
    }
}
