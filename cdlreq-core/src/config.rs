//! Per-project configuration
//!
//! Configuration lives in an optional `.cdlreq.yaml` at the project root. Every
//! field has a default, so a project without the file behaves like:
//!
//! ```yaml
//! selector_delimiter: "::"
//! test_function_prefix: "test_"
//! record_extensions: [yaml, yml]
//! exclude: [target, node_modules, venv, .venv, __pycache__]
//! coverage_threshold: 100.0
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::CoreError;
use crate::selector::SelectorSyntax;

/// Name of the configuration file at the project root
pub const CONFIG_FILE_NAME: &str = ".cdlreq.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Separates a test file path from a function name in selectors and `unit_test`
    pub selector_delimiter: String,

    /// Name prefix that marks a function as a test
    pub test_function_prefix: String,

    /// File extensions scanned for records
    pub record_extensions: Vec<String>,

    /// Directory names skipped while walking the project
    pub exclude: Vec<String>,

    /// Coverage percentage required for the coverage gate to pass
    pub coverage_threshold: f64,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            selector_delimiter: "::".to_string(),
            test_function_prefix: "test_".to_string(),
            record_extensions: vec!["yaml".to_string(), "yml".to_string()],
            exclude: vec![
                "target".to_string(),
                "node_modules".to_string(),
                "venv".to_string(),
                ".venv".to_string(),
                "__pycache__".to_string(),
            ],
            coverage_threshold: 100.0,
        }
    }
}

impl ProjectConfig {
    /// Loads `.cdlreq.yaml` from the project root, falling back to defaults
    pub fn load(root: &Path) -> Result<Self, CoreError> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| CoreError::ConfigUnreadable {
            path: path.clone(),
            source,
        })?;

        // An empty file parses as null; treat it as "all defaults"
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: ProjectConfig =
            serde_yaml::from_str(&content).map_err(|e| CoreError::ConfigInvalid {
                path: path.clone(),
                message: e.to_string(),
            })?;

        config.check().map_err(|message| CoreError::ConfigInvalid { path, message })?;
        Ok(config)
    }

    fn check(&self) -> Result<(), String> {
        if self.selector_delimiter.is_empty() {
            return Err("selector_delimiter must not be empty".to_string());
        }
        if self.test_function_prefix.is_empty() {
            return Err("test_function_prefix must not be empty".to_string());
        }
        if !(0.0..=100.0).contains(&self.coverage_threshold) {
            return Err(format!(
                "coverage_threshold must be between 0 and 100, got {}",
                self.coverage_threshold
            ));
        }
        Ok(())
    }

    /// Overrides the selector delimiter (e.g., from a command-line flag)
    pub fn with_selector_delimiter(mut self, delimiter: &str) -> Result<Self, CoreError> {
        self.selector_delimiter = delimiter.to_string();
        self.check().map_err(|message| CoreError::ConfigInvalid {
            path: CONFIG_FILE_NAME.into(),
            message,
        })?;
        Ok(self)
    }

    /// Selector parsing rule derived from this configuration
    pub fn selector_syntax(&self) -> SelectorSyntax {
        SelectorSyntax::new(self.selector_delimiter.clone())
    }
}
