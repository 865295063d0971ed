use anyhow::Result;
use std::env;
use std::path::{Path, PathBuf};

use crate::config::ProjectConfig;
use crate::error::CoreError;
use crate::registry::{get_registry_path, Registry};

/// Everything a pipeline stage needs to know about one project
#[derive(Debug, Clone)]
pub struct ProjectContext {
    pub name: String,
    pub root: PathBuf,
    pub config: ProjectConfig,
}

impl ProjectContext {
    /// Opens a project root and loads its configuration
    ///
    /// This is the only step of an audit that can fail as a whole: a missing
    /// root or an invalid `.cdlreq.yaml` means there is nothing to report on.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, CoreError> {
        let root = root.as_ref();
        if !root.exists() {
            return Err(CoreError::ProjectRootMissing(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(CoreError::ProjectRootNotDirectory(root.to_path_buf()));
        }

        let config = ProjectConfig::load(root)?;
        let name = root
            .canonicalize()
            .ok()
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());

        Ok(Self {
            name,
            root: root.to_path_buf(),
            config,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Determines the project root to use based on the available information
///
/// An explicit directory wins, then a project named on the command line or in
/// `CDLREQ_PROJECT`, then the registry's only or default project, and finally
/// the current directory.
pub fn determine_project_root(
    directory: Option<&Path>,
    project_option: Option<&str>,
) -> Result<PathBuf> {
    if let Some(directory) = directory {
        return Ok(directory.to_path_buf());
    }

    let env_project = env::var("CDLREQ_PROJECT").ok();
    let named = project_option.or(env_project.as_deref());

    let registry_path = get_registry_path()?;
    if !registry_path.exists() {
        if let Some(name) = named {
            anyhow::bail!("Project '{}' not found: no registry at {:?}", name, registry_path);
        }
        return Ok(PathBuf::from("."));
    }

    let registry = Registry::load(&registry_path)?;

    if let Some(name) = named {
        return match registry.get_project(name) {
            Some(project) => Ok(PathBuf::from(&project.path)),
            None => anyhow::bail!("Project '{}' not found in registry", name),
        };
    }

    if registry.projects.len() == 1 {
        if let Some(project) = registry.projects.values().next() {
            return Ok(PathBuf::from(&project.path));
        }
    }

    if let Some((_, project)) = registry.get_default_project() {
        return Ok(PathBuf::from(&project.path));
    }

    Ok(PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_root() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");

        let err = ProjectContext::open(&missing).unwrap_err();
        assert!(matches!(err, CoreError::ProjectRootMissing(_)));
    }

    #[test]
    fn test_open_file_is_not_a_root() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("requirements.yaml");
        fs::write(&file, "").unwrap();

        let err = ProjectContext::open(&file).unwrap_err();
        assert!(matches!(err, CoreError::ProjectRootNotDirectory(_)));
    }

    #[test]
    fn test_open_loads_config() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("pump-firmware");
        fs::create_dir(&root).unwrap();
        fs::write(root.join(".cdlreq.yaml"), "selector_delimiter: \"#\"\n").unwrap();

        let context = ProjectContext::open(&root).unwrap();
        assert_eq!(context.name, "pump-firmware");
        assert_eq!(context.config.selector_delimiter, "#");
        assert_eq!(context.with_name("pump").name, "pump");
    }

    #[test]
    fn test_explicit_directory_wins() {
        let root = determine_project_root(Some(Path::new("/tmp/project")), Some("ignored")).unwrap();
        assert_eq!(root, PathBuf::from("/tmp/project"));
    }
}
