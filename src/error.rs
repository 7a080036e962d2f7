//! Error classification and presentation
//!
//! Every command failure is classified into an [`ErrorKind`] that decides
//! whether and how it is shown:
//!
//! | Kind | Shown | Meaning |
//! |------|-------|---------|
//! | `Abort` | yes | The user can fix it (bad manifest, conflicting plugins) |
//! | `Bug` | yes | Gestalt itself is at fault |
//! | `AbortSilent` / `BugSilent` | no | Already reported (e.g., by a child tool) |
//! | `Unhandled` | yes | Anything else, including errors thrown by project code |

use std::any::Any;
use std::fmt;

use thiserror::Error;

use crate::config::ConfigError;
use crate::plugin::{DiscoveryError, MergeError};
use crate::project::ProjectError;
use crate::script::EvaluationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Bug,
    Abort,
    BugSilent,
    AbortSilent,
    Unhandled,
}

impl ErrorKind {
    pub fn is_silent(self) -> bool {
        matches!(self, ErrorKind::BugSilent | ErrorKind::AbortSilent)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Bug => "bug",
            ErrorKind::Abort => "abort",
            ErrorKind::BugSilent => "bug (silent)",
            ErrorKind::AbortSilent => "abort (silent)",
            ErrorKind::Unhandled => "unhandled",
        };
        f.write_str(name)
    }
}

/// An error raised deliberately by a command
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct Fatal {
    pub kind: ErrorKind,
    pub message: String,
    pub cause: Option<String>,
    pub next: Option<String>,
}

impl Fatal {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            next: None,
        }
    }

    pub fn abort(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Abort, message)
    }

    pub fn bug(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Bug, message)
    }

    pub fn abort_silent() -> Self {
        Self::new(ErrorKind::AbortSilent, "")
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }
}

/// A classified error, ready to be presented
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub kind: ErrorKind,
    pub message: String,
    pub cause: Option<String>,
    pub next: Option<String>,
}

impl From<&Fatal> for Report {
    fn from(fatal: &Fatal) -> Self {
        Self {
            kind: fatal.kind,
            message: fatal.message.clone(),
            cause: fatal.cause.clone(),
            next: fatal.next.clone(),
        }
    }
}

/// Classifies an error by the first recognized error in its chain
pub fn classify(error: &anyhow::Error) -> Report {
    for (depth, cause) in error.chain().enumerate() {
        let underlying = || {
            let rest: Vec<String> = error.chain().skip(depth + 1).map(ToString::to_string).collect();
            (!rest.is_empty()).then(|| rest.join(": "))
        };

        if let Some(fatal) = cause.downcast_ref::<Fatal>() {
            return fatal.into();
        }
        if let Some(e) = cause.downcast_ref::<EvaluationError>() {
            return unhandled(e.to_string(), underlying());
        }
        if let Some(e) = cause.downcast_ref::<DiscoveryError>() {
            if let DiscoveryError::Evaluation(inner) = e {
                return unhandled(inner.to_string(), underlying());
            }
            return abort(e.to_string(), underlying(), discovery_hint(e));
        }
        if let Some(e) = cause.downcast_ref::<ProjectError>() {
            if let ProjectError::Evaluation(inner) = e {
                return unhandled(inner.to_string(), underlying());
            }
            return abort(e.to_string(), underlying(), project_hint(e));
        }
        if let Some(e) = cause.downcast_ref::<MergeError>() {
            return abort(e.to_string(), None, merge_hint(e));
        }
        if let Some(e) = cause.downcast_ref::<ConfigError>() {
            return abort(
                e.to_string(),
                None,
                Some("Fix the file or remove it to use the defaults".to_string()),
            );
        }
    }

    let rest: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    unhandled(error.to_string(), (!rest.is_empty()).then(|| rest.join(": ")))
}

fn abort(message: String, cause: Option<String>, next: Option<String>) -> Report {
    Report {
        kind: ErrorKind::Abort,
        message,
        cause,
        next,
    }
}

fn unhandled(message: String, cause: Option<String>) -> Report {
    Report {
        kind: ErrorKind::Unhandled,
        message,
        cause,
        next: None,
    }
}

fn discovery_hint(error: &DiscoveryError) -> Option<String> {
    let hint = match error {
        DiscoveryError::PackageJsonNotFound(dir) => format!(
            "Reinstall the dependencies, or remove {} if it isn't a Gestalt plugin",
            dir.display()
        ),
        DiscoveryError::InvalidPackageJson { .. } => "Fix the JSON syntax of the package.json".to_string(),
        DiscoveryError::NoNameInPackageJson(dir) => {
            format!("Add a \"name\" to {}", dir.join("package.json").display())
        }
        DiscoveryError::EntryModuleNotFound(_) => {
            "Plugins must export their definition from plugin.ts or plugin.js".to_string()
        }
        DiscoveryError::NameCollision { .. } => "Remove one of the plugins so that every name is unique".to_string(),
        DiscoveryError::InvalidDefinition { .. } => {
            "The default export must look like definePlugin({ description, renderer })".to_string()
        }
        DiscoveryError::Io { .. } | DiscoveryError::Evaluation(_) => return None,
    };
    Some(hint)
}

fn project_hint(error: &ProjectError) -> Option<String> {
    let hint = match error {
        ProjectError::DirectoryNotFound(_) | ProjectError::ManifestNotFound(_) => {
            "Run the command from a Gestalt project, or point --path at one".to_string()
        }
        ProjectError::NoName(_) => "Add a name to the project manifest".to_string(),
        ProjectError::InvalidManifest { .. } => {
            "The manifest supports name, pluginDirectories and alias".to_string()
        }
        ProjectError::InvalidTarget { .. } => {
            "Targets must declare their platforms: web, desktop, ios or android".to_string()
        }
        ProjectError::Io { .. } | ProjectError::Evaluation(_) => return None,
    };
    Some(hint)
}

fn merge_hint(error: &MergeError) -> Option<String> {
    let hint = match error {
        MergeError::DependencyVersionConflict { .. } => {
            "Align the versions the plugins require, or remove one of the plugins".to_string()
        }
        MergeError::DuplicatePlugin(_) => "Remove one of the plugins so that every name is unique".to_string(),
    };
    Some(hint)
}

/// Renders a report, or `None` for silent kinds
pub fn render(report: &Report) -> Option<String> {
    if report.kind.is_silent() {
        return None;
    }

    let mut out = String::from("What happened\n");
    out.push_str(&report.message);
    out.push('\n');

    if let Some(cause) = &report.cause {
        out.push_str("\nCause\n");
        out.push_str(cause);
        out.push('\n');
    }

    let next = match (report.kind, &report.next) {
        (_, Some(next)) => Some(next.as_str()),
        (ErrorKind::Bug, None) => Some("This is a bug in Gestalt. Please report it with the output above"),
        _ => None,
    };
    if let Some(next) = next {
        out.push_str("\nNext\n");
        out.push_str(next);
        out.push('\n');
    }

    Some(out)
}

/// Turns the payload of a caught panic into a [`ErrorKind::Bug`] error
pub fn from_panic(payload: &(dyn Any + Send)) -> anyhow::Error {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());

    let fatal = Fatal::bug("Gestalt stopped unexpectedly");
    match detail {
        Some(detail) => fatal.with_cause(detail).into(),
        None => fatal.into(),
    }
}

/// Presents a command failure on stderr
pub fn handle(error: &anyhow::Error) {
    let report = classify(error);
    tracing::debug!(kind = %report.kind, error = ?error, "command failed");

    if let Some(rendered) = render(&report) {
        eprint!("{}", rendered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use std::path::PathBuf;

    #[test]
    fn fatal_passes_through() {
        let error = anyhow::Error::new(Fatal::abort("Nope").with_next("Try again"));
        let report = classify(&error);

        assert_eq!(report.kind, ErrorKind::Abort);
        assert_eq!(report.message, "Nope");
        assert_eq!(report.next.as_deref(), Some("Try again"));
    }

    #[test]
    fn discovery_errors_abort_with_hints() {
        let error: anyhow::Error = DiscoveryError::NoNameInPackageJson(PathBuf::from("/p")).into();
        let report = classify(&error);

        assert_eq!(report.kind, ErrorKind::Abort);
        assert!(report.next.unwrap().contains("package.json"));
    }

    #[test]
    fn evaluation_errors_are_unhandled() {
        let evaluation = EvaluationError::NoDefaultExport(PathBuf::from("/p/plugin.ts"));
        let error: anyhow::Error = DiscoveryError::Evaluation(evaluation).into();

        assert_eq!(classify(&error).kind, ErrorKind::Unhandled);
    }

    #[test]
    fn context_does_not_hide_the_classification() {
        let error = Err::<(), _>(MergeError::DuplicatePlugin("vue".into()))
            .context("Failed to load the project")
            .unwrap_err();

        let report = classify(&error);
        assert_eq!(report.kind, ErrorKind::Abort);
        assert_eq!(report.message, "The plugin 'vue' is registered more than once");
    }

    #[test]
    fn unknown_errors_are_unhandled() {
        let error = anyhow::anyhow!("boom");
        assert_eq!(classify(&error).kind, ErrorKind::Unhandled);
    }

    #[test]
    fn renders_sections() {
        let report = Report {
            kind: ErrorKind::Abort,
            message: "Something failed".into(),
            cause: Some("disk full".into()),
            next: Some("Free some space".into()),
        };

        assert_eq!(
            render(&report).unwrap(),
            "What happened\nSomething failed\n\nCause\ndisk full\n\nNext\nFree some space\n"
        );
    }

    #[test]
    fn bugs_ask_for_a_report() {
        let report: Report = (&Fatal::bug("Unexpected state")).into();
        assert!(render(&report).unwrap().contains("report it"));
    }

    #[test]
    fn silent_kinds_render_nothing() {
        assert!(render(&Report::from(&Fatal::abort_silent())).is_none());
        let bug_silent = Fatal {
            kind: ErrorKind::BugSilent,
            message: String::new(),
            cause: None,
            next: None,
        };
        assert!(render(&Report::from(&bug_silent)).is_none());
    }

    #[test]
    fn panics_are_reported_as_bugs() {
        let payload = std::panic::catch_unwind(|| panic!("index out of bounds")).unwrap_err();
        let report = classify(&from_panic(payload.as_ref()));

        assert_eq!(report.kind, ErrorKind::Bug);
        assert_eq!(report.cause.as_deref(), Some("index out of bounds"));
        assert!(render(&report).unwrap().contains("report it"));
    }
}
