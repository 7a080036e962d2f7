//! Route listing

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use super::app::ProjectArgs;
use super::output::{relativize, Output, Style};
use crate::error::Fatal;
use crate::project::{Project, Route, Target};

#[derive(Serialize)]
struct RoutesReport<'a> {
    routes: BTreeMap<&'a str, &'a [Route]>,
}

pub fn run(args: &ProjectArgs, target: Option<&str>, output: &Output) -> Result<()> {
    let project = Project::load(&args.path)?;

    let targets: Vec<&Target> = match target {
        Some(name) => {
            let target = project.target(name).ok_or_else(|| {
                let known: Vec<&str> = project.targets.iter().map(|t| t.name.as_str()).collect();
                Fatal::abort(format!("The project has no target named '{}'", name))
                    .with_next(format!("Pick one of: {}", known.join(", ")))
            })?;
            vec![target]
        }
        None => project.targets.iter().collect(),
    };

    if output.is_json() {
        let routes: BTreeMap<&str, &[Route]> = targets.iter().map(|t| (t.name.as_str(), t.routes.as_slice())).collect();
        output.data(&RoutesReport { routes });
        return Ok(());
    }

    if targets.is_empty() {
        output.text("The project has no targets");
        return Ok(());
    }

    let mut lines = Vec::new();
    for target in targets {
        lines.push(output.style(Style::Heading, &target.name));
        if target.routes.is_empty() {
            lines.push("  (no routes)".to_string());
        }
        let width = target.routes.iter().map(|r| r.path.len()).max().unwrap_or(0);
        for route in &target.routes {
            lines.push(format!("  {:<width$}  {}", route.path, relativize(&route.file), width = width));
        }
        lines.push(String::new());
    }
    output.text(&lines.join("\n"));

    Ok(())
}
