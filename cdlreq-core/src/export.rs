use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Serialisation format for machine-readable reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Yaml,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Yaml => "yaml",
        }
    }

    /// Guesses the format from a file extension, defaulting to JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => ExportFormat::Yaml,
            _ => ExportFormat::Json,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "yaml" | "yml" => Ok(ExportFormat::Yaml),
            other => Err(format!("Unknown export format: {}", other)),
        }
    }
}

/// Renders a report as pretty JSON or YAML
pub fn to_string<T: Serialize + ?Sized>(value: &T, format: ExportFormat) -> Result<String> {
    let rendered = match format {
        ExportFormat::Json => {
            serde_json::to_string_pretty(value).context("Failed to serialize report as JSON")?
        }
        ExportFormat::Yaml => {
            serde_yaml::to_string(value).context("Failed to serialize report as YAML")?
        }
    };
    Ok(rendered)
}

/// Writes a report to `output_path`, creating parent directories as needed
pub fn write_report<T: Serialize + ?Sized>(
    value: &T,
    output_path: &Path,
    format: ExportFormat,
) -> Result<()> {
    let mut content = to_string(value, format)?;
    if !content.ends_with('\n') {
        content.push('\n');
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }

    fs::write(output_path, content)
        .with_context(|| format!("Failed to write report to {:?}", output_path))?;

    log::info!("Exported {} report: {}", format, output_path.display());
    Ok(())
}
