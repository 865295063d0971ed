pub mod audit;
pub mod config;
pub mod coverage;
pub mod defects;
pub mod error;
pub mod export;
pub mod graph;
pub mod loader;
pub mod models;
pub mod probe;
pub mod project;
pub mod registry;
pub mod scaffolding;
pub mod selector;
pub mod store;
pub mod validator;

// Re-export commonly used types
pub use audit::{audit_projects, AuditReport, AuditSummary, Auditor, ProjectAnalysis};
pub use config::{ProjectConfig, CONFIG_FILE_NAME};
pub use coverage::{
    CoverageReconciler, CoverageReport, CoverageSummary, CoverageVerdict, SpecCoverage,
};
pub use defects::{canonicalize, Defect, DefectKind};
pub use error::{CoreError, ProbeError};
pub use export::{write_report, ExportFormat};
pub use graph::{MatrixEntry, MatrixRow, TraceabilityGraph, TraceabilityMatrix};
pub use loader::{LoadFailure, LoadOutcome, RawRecord, RecordLoader, YamlRecordLoader};
pub use models::{
    Record, RecordKind, Requirement, RequirementType, SourceLocation, Specification,
    MAX_TITLE_LENGTH, MIN_CRITERION_LENGTH,
};
pub use probe::{DiskProbe, FilesystemProbe, TestFunctionScanner};
pub use project::{determine_project_root, ProjectContext};
pub use registry::{get_registry_path, Project, Registry};
pub use scaffolding::{ScaffoldArtifact, ScaffoldError, ScaffoldPreview, Scaffolder};
pub use selector::{ExecutedTests, SelectorError, SelectorSyntax, TestTarget};
pub use store::{FieldError, RecordStore, StoredRecord};
pub use validator::{RecordValidation, SchemaValidator, Violation};
