//! File-system routes

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use super::ProjectError;

/// Extensions of files that define routes
pub const ROUTE_EXTENSIONS: [&str; 6] = ["ts", "tsx", "js", "jsx", "vue", "svelte"];

/// A URL path and the file that serves it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub path: String,
    pub file: PathBuf,
}

/// Several files that map to the same URL path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteConflict {
    pub path: String,
    pub files: Vec<PathBuf>,
}

/// Maps a file path relative to the routes directory to a URL path
///
/// Returns `None` for files that don't define routes.
pub fn route_path(relative: &Path) -> Option<String> {
    let extension = relative.extension()?.to_str()?;
    if !ROUTE_EXTENSIONS.contains(&extension) {
        return None;
    }
    // type declarations (`foo.d.ts`)
    let stem = relative.file_stem()?.to_str()?;
    if extension == "ts" && stem.ends_with(".d") {
        return None;
    }

    let mut segments = Vec::new();
    for component in relative.with_extension("").components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?.to_string()),
            _ => return None,
        }
    }

    if segments.last().map(String::as_str) == Some("index") {
        segments.pop();
    }

    let segments: Vec<String> = segments.iter().map(|s| url_segment(s)).collect();
    Some(format!("/{}", segments.join("/")))
}

fn url_segment(segment: &str) -> String {
    if let Some(rest) = segment.strip_prefix("[...").and_then(|s| s.strip_suffix(']')) {
        format!("*{}", rest)
    } else if let Some(param) = segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        format!(":{}", param)
    } else {
        segment.to_string()
    }
}

/// Lists the routes defined under `directory`, sorted by path
///
/// A missing directory defines no routes.
pub fn load_routes(directory: &Path) -> Result<Vec<Route>, ProjectError> {
    let mut files = Vec::new();
    collect_files(directory, &mut files)?;

    let mut routes: Vec<Route> = files
        .into_iter()
        .filter_map(|file| {
            let relative = file.strip_prefix(directory).ok()?;
            let path = route_path(relative)?;
            Some(Route { path, file })
        })
        .collect();

    routes.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.file.cmp(&b.file)));
    Ok(routes)
}

fn collect_files(directory: &Path, files: &mut Vec<PathBuf>) -> Result<(), ProjectError> {
    let io = |source| ProjectError::Io {
        path: directory.to_path_buf(),
        source,
    };

    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(io(e)),
    };

    for entry in entries {
        let entry = entry.map_err(io)?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        // symlinked directories are not followed, so links can't loop
        let path = entry.path();
        let file_type = entry.file_type().map_err(io)?;
        if file_type.is_dir() {
            collect_files(&path, files)?;
        } else if !file_type.is_symlink() || path.is_file() {
            files.push(path);
        }
    }

    Ok(())
}

/// Finds URL paths served by more than one file
pub fn find_conflicts(routes: &[Route]) -> Vec<RouteConflict> {
    let mut by_path: BTreeMap<&str, Vec<PathBuf>> = BTreeMap::new();
    for route in routes {
        by_path.entry(route.path.as_str()).or_default().push(route.file.clone());
    }

    by_path
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|(path, files)| RouteConflict {
            path: path.to_string(),
            files,
        })
        .collect()
}
