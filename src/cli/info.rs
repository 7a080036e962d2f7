//! Project overview

use anyhow::Result;
use serde::Serialize;

use super::app::ProjectArgs;
use super::output::{relativize, Output, Style};
use crate::project::Project;

#[derive(Serialize)]
struct InfoReport<'a> {
    project: &'a Project,
}

pub fn run(args: &ProjectArgs, output: &Output) -> Result<()> {
    let project = Project::load(&args.path)?;

    if output.is_json() {
        output.data(&InfoReport { project: &project });
    } else {
        output.text(&pretty(&project, output));
    }

    Ok(())
}

fn pretty(project: &Project, output: &Output) -> String {
    let label = |text: &str| output.style(Style::Label, text);
    let configuration = &project.configuration;
    let mut lines = Vec::new();

    lines.push(output.style(Style::Heading, "Project"));
    lines.push(format!("  {} {}", label("Name:"), configuration.name));
    lines.push(format!("  {} {}", label("Directory:"), relativize(&project.directory)));
    lines.push(format!("  {} {}", label("Manifest:"), relativize(&configuration.manifest_path)));
    lines.push(String::new());

    if !configuration.plugins.is_empty() {
        lines.push(output.style(Style::Heading, "Plugins"));
        for plugin in &configuration.plugins {
            lines.push(format!("  {} {}", label(&format!("{}:", plugin.name)), plugin.description));
        }
        lines.push(String::new());
    }

    if !configuration.renderer_dependencies.is_empty() {
        lines.push(output.style(Style::Heading, "Renderer dependencies"));
        for (name, version) in &configuration.renderer_dependencies {
            lines.push(format!("  {} {}", label(&format!("{}:", name)), version));
        }
        lines.push(String::new());
    }

    if !project.targets.is_empty() {
        lines.push(output.style(Style::Heading, "Targets"));
        lines.push(format!("    {}", output.style(Style::Subheading, "Main")));
        for target in &project.targets {
            let platforms: Vec<String> = target.platforms.iter().map(ToString::to_string).collect();
            lines.push(format!(
                "      {}",
                output.style(Style::Emphasis, &format!("{} [{}]", target.name, platforms.join(",")))
            ));
            lines.push(format!("        {} {}", label("Directory:"), relativize(&target.directory)));
            lines.push(format!("        {} {}", label("Manifest:"), relativize(&target.manifest_path)));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}
