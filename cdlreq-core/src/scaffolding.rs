//! Project scaffolding for `cdlreq init` and `cdlreq create`
//!
//! Creates the `requirements/` layout with one example requirement and one
//! example specification, or writes a single new record. Existing files are
//! never overwritten.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{Record, Requirement, Specification};

/// Represents a scaffolding artifact to be generated
#[derive(Debug, Clone)]
pub struct ScaffoldArtifact {
    /// Relative path from project root
    pub path: PathBuf,
    /// Content of the artifact
    pub content: String,
    /// Description of what this artifact does
    pub description: String,
    /// Whether the file already exists
    pub exists: bool,
}

/// Result of scaffolding preview
#[derive(Debug, Clone, Default)]
pub struct ScaffoldPreview {
    /// Artifacts to be generated
    pub artifacts: Vec<ScaffoldArtifact>,
    /// Existing files that will be left untouched
    pub skipped: Vec<PathBuf>,
    /// New files that would be created
    pub new_files: Vec<PathBuf>,
    /// Directories that would be created
    pub new_dirs: Vec<PathBuf>,
}

/// Errors that can occur during scaffolding
#[derive(Error, Debug)]
pub enum ScaffoldError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to overwrite existing file {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Failed to render {what}: {source}")]
    Render {
        what: &'static str,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Scaffolding generator
pub struct Scaffolder {
    project_root: PathBuf,
}

impl Scaffolder {
    pub const REQUIREMENTS_DIR: &'static str = "requirements";
    pub const SPECIFICATIONS_DIR: &'static str = "requirements/specifications";

    pub fn new<P: AsRef<Path>>(project_root: P) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    /// Generate a preview of what would be scaffolded
    pub fn preview(&self) -> Result<ScaffoldPreview, ScaffoldError> {
        let mut preview = ScaffoldPreview::default();

        for dir in [Self::REQUIREMENTS_DIR, Self::SPECIFICATIONS_DIR] {
            let dir = PathBuf::from(dir);
            if !self.project_root.join(&dir).is_dir() {
                preview.new_dirs.push(dir);
            }
        }

        let candidates = [
            (
                Path::new(Self::REQUIREMENTS_DIR).join("authentication.yaml"),
                render("requirement", &example_requirement())?,
                "Example requirement",
            ),
            (
                Path::new(Self::SPECIFICATIONS_DIR).join("authentication.yaml"),
                render("specification", &example_specification())?,
                "Example specification tracing REQ-SYS-001",
            ),
        ];

        for (path, content, description) in candidates {
            let exists = self.project_root.join(&path).exists();
            if exists {
                preview.skipped.push(path.clone());
            } else {
                preview.new_files.push(path.clone());
            }
            preview.artifacts.push(ScaffoldArtifact {
                path,
                content,
                description: description.to_string(),
                exists,
            });
        }

        Ok(preview)
    }

    /// Apply the scaffolding, returning the files that were written
    pub fn apply(&self, preview: &ScaffoldPreview) -> Result<Vec<PathBuf>, ScaffoldError> {
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ScaffoldError::Io { path, source }
        };

        // Create directories first
        for dir in &preview.new_dirs {
            let full_path = self.project_root.join(dir);
            fs::create_dir_all(&full_path).map_err(io_error(&full_path))?;
        }

        let mut written_files = Vec::new();
        for artifact in preview.artifacts.iter().filter(|a| !a.exists) {
            let full_path = self.project_root.join(&artifact.path);
            if full_path.exists() {
                log::warn!("Not overwriting {}", full_path.display());
                continue;
            }
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent).map_err(io_error(parent))?;
            }
            fs::write(&full_path, &artifact.content).map_err(io_error(&full_path))?;
            written_files.push(artifact.path.clone());
        }

        Ok(written_files)
    }

    /// Where `create` puts a record when no output path is given
    ///
    /// `REQ-SYS-001` goes to `requirements/req_sys_001.yaml`, specifications
    /// to the same name under `requirements/specifications/`.
    pub fn default_record_path(record: &Record) -> PathBuf {
        let dir = match record {
            Record::Requirement(_) => Self::REQUIREMENTS_DIR,
            Record::Specification(_) => Self::SPECIFICATIONS_DIR,
        };
        let stem = record.id().to_lowercase().replace('-', "_");
        Path::new(dir).join(format!("{}.yaml", stem))
    }

    /// Writes one record to `output` (or its default path), failing if the file exists
    ///
    /// Relative paths are taken from the project root. Returns the path written.
    pub fn create_record(
        &self,
        record: &Record,
        output: Option<&Path>,
    ) -> Result<PathBuf, ScaffoldError> {
        let path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Self::default_record_path(record));
        let full_path = self.project_root.join(&path);

        let content = match record {
            Record::Requirement(req) => render("requirement", req)?,
            Record::Specification(spec) => render("specification", spec)?,
        };

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).map_err(|source| ScaffoldError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let io_error = |source: std::io::Error| ScaffoldError::Io {
            path: full_path.clone(),
            source,
        };
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&full_path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ScaffoldError::AlreadyExists(full_path));
            }
            Err(e) => return Err(io_error(e)),
        };
        file.write_all(content.as_bytes()).map_err(io_error)?;

        log::info!("Created {} at {}", record.id(), full_path.display());
        Ok(full_path)
    }
}

fn render<T: serde::Serialize>(what: &'static str, value: &T) -> Result<String, ScaffoldError> {
    serde_yaml::to_string(value).map_err(|source| ScaffoldError::Render { what, source })
}

fn example_requirement() -> Requirement {
    Requirement {
        id: "REQ-SYS-001".to_string(),
        title: "System shall authenticate users".to_string(),
        description:
            "The system must provide secure user authentication using industry-standard methods."
                .to_string(),
        req_type: "security".to_string(),
        acceptance_criteria: vec![
            "User can log in with valid credentials".to_string(),
            "Invalid credentials are rejected".to_string(),
            "Account lockout after failed attempts".to_string(),
        ],
        tags: vec!["authentication".to_string(), "security".to_string()],
        source: None,
        rationale: None,
    }
}

fn example_specification() -> Specification {
    Specification {
        id: "SPEC-SYS-001".to_string(),
        title: "User authentication implementation".to_string(),
        description: "Implementation of secure user authentication system using OAuth 2.0."
            .to_string(),
        related_requirements: vec!["REQ-SYS-001".to_string()],
        implementation_unit: "src/auth/authentication.py".to_string(),
        unit_test: "tests/test_authentication.py".to_string(),
        test_criteria: Vec::new(),
        design_notes: None,
        dependencies: Vec::new(),
    }
}
