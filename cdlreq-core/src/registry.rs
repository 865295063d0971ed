use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Represents a project in the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Path to the project root
    pub path: String,
    /// Description of the project
    #[serde(default)]
    pub description: String,
}

/// Registry of all projects known to `cdlreq audit`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub projects: BTreeMap<String, Project>,
    /// Optional default project name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_project: Option<String>,
}

impl Registry {
    /// Loads the registry from the provided path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read registry file: {:?}", path.as_ref()))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse registry file: {:?}", path.as_ref()))
    }

    /// Loads the registry, or starts an empty one if the file does not exist yet
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Gets a project by name
    pub fn get_project(&self, name: &str) -> Option<&Project> {
        self.projects.get(name)
    }

    /// Lists all project names in alphabetical order
    pub fn list_projects(&self) -> Vec<&str> {
        self.projects.keys().map(|k| k.as_str()).collect()
    }

    /// Registers a new project or updates an existing one
    pub fn register_project(&mut self, name: String, path: String, description: String) {
        self.projects.insert(name, Project { path, description });
    }

    /// Sets a project as the default
    pub fn set_default_project(&mut self, name: &str) -> Result<()> {
        if !self.projects.contains_key(name) {
            anyhow::bail!("Project '{}' not found in registry", name);
        }

        self.default_project = Some(name.to_string());
        Ok(())
    }

    /// Gets the default project if set
    pub fn get_default_project(&self) -> Option<(&str, &Project)> {
        let name = self.default_project.as_deref()?;
        self.projects.get(name).map(|project| (name, project))
    }

    /// Save the registry to the specified path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(&self)?;

        // Ensure parent directories exist
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write registry to {:?}", path.as_ref()))?;

        Ok(())
    }
}

/// Gets the path to the registry file
pub fn get_registry_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CDLREQ_REGISTRY_PATH") {
        return Ok(PathBuf::from(path));
    }

    let home_dir = dirs::home_dir().context("Failed to determine home directory")?;

    Ok(home_dir.join(".cdlreq").join("registry.yaml"))
}
