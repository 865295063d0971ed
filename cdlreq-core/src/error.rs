use std::path::PathBuf;
use thiserror::Error;

/// Run-level failures that abort an audit without a partial report
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Project root does not exist: {0}")]
    ProjectRootMissing(PathBuf),

    #[error("Project root is not a directory: {0}")]
    ProjectRootNotDirectory(PathBuf),

    #[error("Failed to read configuration {path}: {source}")]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },
}

/// Failures reported by a filesystem probe
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Unable to read test file {path}: {source}")]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
