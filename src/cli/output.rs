//! Output formatting for CLI commands

use std::io::IsTerminal;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Terminal styles used by text output
#[derive(Debug, Clone, Copy)]
pub enum Style {
    Heading,
    Subheading,
    Emphasis,
    Label,
}

impl Style {
    fn codes(self) -> &'static str {
        match self {
            Style::Heading => "1;32",
            Style::Subheading => "1;36",
            Style::Emphasis => "1;33",
            Style::Label => "1",
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    format: OutputFormat,
    color: bool,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        let color = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
        Self { format, color }
    }

    /// Disables terminal styling
    pub fn plain(mut self) -> Self {
        self.color = false;
        self
    }

    /// Prints a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Text => println!("{}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({
                        "success": true,
                        "message": message
                    })
                );
            }
        }
    }

    /// Prints structured data as JSON
    pub fn data<T: Serialize>(&self, data: &T) {
        if let Ok(json) = serde_json::to_string_pretty(data) {
            println!("{}", json);
        }
    }

    /// Prints pre-rendered text (text only)
    pub fn text(&self, text: &str) {
        if self.format == OutputFormat::Text {
            println!("{}", text);
        }
    }

    /// Applies a terminal style to `text`
    pub fn style(&self, style: Style, text: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", style.codes(), text)
        } else {
            text.to_string()
        }
    }

    /// Returns true if using JSON format
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

/// Displays `path` relative to the working directory when it is inside it
pub fn relativize(path: &Path) -> String {
    let relative = std::env::current_dir()
        .ok()
        .and_then(|cwd| std::fs::canonicalize(cwd).ok())
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf));

    match relative {
        Some(relative) if relative.as_os_str().is_empty() => ".".to_string(),
        Some(relative) => relative.display().to_string(),
        None => path.display().to_string(),
    }
}
