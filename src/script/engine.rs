//! QuickJS host
//!
//! Each evaluation gets its own runtime. Module specifiers go through
//! [`Resolver`], TypeScript sources have their types erased before QuickJS
//! sees them and JSON files become modules with a default export.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rquickjs::convert::Coerced;
use rquickjs::function::Rest;
use rquickjs::loader::{Loader, Resolver as ModuleResolver};
use rquickjs::module::Declared;
use rquickjs::{Context, Ctx, Function, Module, Object, Runtime};
use serde::Deserialize;

use super::resolve::Resolver;
use super::strip::strip_types;
use super::EvaluationError;

/// Stack available to JavaScript, below the 2 MiB of a spawned thread
const MAX_STACK_SIZE: usize = 1024 * 1024;

const MEMORY_LIMIT: usize = 64 * 1024 * 1024;

const RESULT_GLOBAL: &str = "__gestaltDefaultExport";
const ERROR_GLOBAL: &str = "__gestaltError";

/// The first resolution or loading failure of an evaluation
///
/// QuickJS turns these into exceptions; the recorded error keeps the path
/// and kind for the caller.
#[derive(Clone, Default)]
struct Failure(Rc<RefCell<Option<EvaluationError>>>);

impl Failure {
    fn record(&self, error: EvaluationError) {
        let mut slot = self.0.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    fn take(&self) -> Option<EvaluationError> {
        self.0.borrow_mut().take()
    }
}

struct HostResolver {
    resolver: Resolver,
    failure: Failure,
}

impl ModuleResolver for HostResolver {
    fn resolve<'js>(&mut self, _ctx: &Ctx<'js>, base: &str, name: &str) -> rquickjs::Result<String> {
        match self.resolver.resolve(name, Path::new(base)) {
            Ok(path) => {
                // one module record per file, however it was reached
                let path = fs::canonicalize(&path).unwrap_or(path);
                Ok(path.to_string_lossy().into_owned())
            }
            Err(error) => {
                let message = error.to_string();
                self.failure.record(error);
                Err(rquickjs::Error::new_resolving_message(base, name, message))
            }
        }
    }
}

struct HostLoader {
    failure: Failure,
}

impl Loader for HostLoader {
    fn load<'js>(&mut self, ctx: &Ctx<'js>, name: &str) -> rquickjs::Result<Module<'js, Declared>> {
        match module_source(Path::new(name)) {
            Ok(source) => Module::declare(ctx.clone(), name, source),
            Err(error) => {
                let message = error.to_string();
                self.failure.record(error);
                Err(rquickjs::Error::new_loading_message(name, message))
            }
        }
    }
}

/// Reads the module at `path` as JavaScript
fn module_source(path: &Path) -> Result<String, EvaluationError> {
    let source = fs::read_to_string(path).map_err(|source| EvaluationError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("ts" | "mts") => strip_types(path, &source),
        Some("json") => {
            let value: serde_json::Value =
                serde_json::from_str(&source).map_err(|source| EvaluationError::InvalidJson {
                    path: path.to_path_buf(),
                    source,
                })?;
            Ok(format!("export default {};", value))
        }
        _ => Ok(source),
    }
}

/// What the import script hands back
#[derive(Debug, Deserialize)]
struct Exported {
    found: bool,
    #[serde(default)]
    value: serde_json::Value,
}

/// Evaluates the module at `entry` and returns its default export as JSON
///
/// A default export that is a function taking no arguments is called and
/// its (awaited) result is returned instead.
pub fn evaluate(entry: &Path, resolver: Resolver) -> Result<serde_json::Value, EvaluationError> {
    let entry = fs::canonicalize(entry).map_err(|source| EvaluationError::Io {
        path: entry.to_path_buf(),
        source,
    })?;
    let engine_error = |e: rquickjs::Error| EvaluationError::Engine {
        path: entry.clone(),
        message: e.to_string(),
    };

    let failure = Failure::default();
    let runtime = Runtime::new().map_err(engine_error)?;
    runtime.set_max_stack_size(MAX_STACK_SIZE);
    runtime.set_memory_limit(MEMORY_LIMIT);
    runtime.set_loader(
        HostResolver {
            resolver,
            failure: failure.clone(),
        },
        HostLoader {
            failure: failure.clone(),
        },
    );
    let context = Context::full(&runtime).map_err(engine_error)?;

    let script = import_script(&entry);
    context
        .with(|ctx| -> rquickjs::Result<()> {
            install_console(&ctx)?;
            ctx.eval::<(), _>(script)
        })
        .map_err(engine_error)?;

    while runtime.is_job_pending() {
        if runtime.execute_pending_job().is_err() {
            break;
        }
    }

    let (result, thrown) = context
        .with(|ctx| -> rquickjs::Result<(Option<String>, Option<String>)> {
            let globals = ctx.globals();
            Ok((globals.get(RESULT_GLOBAL)?, globals.get(ERROR_GLOBAL)?))
        })
        .map_err(engine_error)?;

    match (result, thrown) {
        (_, Some(message)) => Err(failure.take().unwrap_or_else(|| EvaluationError::Exception {
            path: entry,
            message: message.trim_end().to_string(),
        })),
        (Some(json), None) => default_export(&entry, &json),
        (None, None) => Err(EvaluationError::Exception {
            path: entry,
            message: "the module never finished evaluating".to_string(),
        }),
    }
}

/// Script that imports `entry` and stores its default export, serialized,
/// in a global
fn import_script(entry: &Path) -> String {
    let specifier = serde_json::Value::String(entry.to_string_lossy().into_owned());
    format!(
        r#"import({specifier})
  .then(async (module) => {{
    const found = "default" in module;
    let value = found ? module.default : undefined;
    if (typeof value === "function" && value.length === 0) value = await value();
    globalThis.{result} = JSON.stringify({{ found, value }});
  }})
  .catch((error) => {{
    const stack = error && error.stack ? "\n" + error.stack : "";
    globalThis.{error} = String(error) + stack;
  }});
undefined;
"#,
        specifier = specifier,
        result = RESULT_GLOBAL,
        error = ERROR_GLOBAL,
    )
}

fn default_export(entry: &Path, json: &str) -> Result<serde_json::Value, EvaluationError> {
    let exported: Exported = serde_json::from_str(json).map_err(|e| EvaluationError::Unsupported {
        path: entry.to_path_buf(),
        message: format!("the default export can't be represented as JSON: {}", e),
    })?;
    if !exported.found {
        return Err(EvaluationError::NoDefaultExport(entry.to_path_buf()));
    }
    Ok(exported.value)
}

/// `console` methods forward to tracing
fn install_console(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    fn line(args: Rest<Coerced<String>>) -> String {
        args.0.into_iter().map(|arg| arg.0).collect::<Vec<_>>().join(" ")
    }

    let console = Object::new(ctx.clone())?;
    console.set(
        "log",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::info!(target: "gestalt::script", "{}", line(args));
        })?,
    )?;
    console.set(
        "info",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::info!(target: "gestalt::script", "{}", line(args));
        })?,
    )?;
    console.set(
        "debug",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::debug!(target: "gestalt::script", "{}", line(args));
        })?,
    )?;
    console.set(
        "warn",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::warn!(target: "gestalt::script", "{}", line(args));
        })?,
    )?;
    console.set(
        "error",
        Function::new(ctx.clone(), |args: Rest<Coerced<String>>| {
            tracing::error!(target: "gestalt::script", "{}", line(args));
        })?,
    )?;
    ctx.globals().set("console", console)?;
    Ok(())
}
