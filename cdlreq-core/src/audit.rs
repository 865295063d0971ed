//! End-to-end pipeline for one project
//!
//! Store -> Validator -> Graph Builder -> Reconciler, with every defect from
//! every stage collected into a single canonical list.

use serde::Serialize;

use crate::coverage::{CoverageReconciler, CoverageReport};
use crate::defects::{canonicalize, Defect};
use crate::graph::{TraceabilityGraph, TraceabilityMatrix};
use crate::loader::{RecordLoader, YamlRecordLoader};
use crate::probe::{DiskProbe, FilesystemProbe, TestFunctionScanner};
use crate::project::ProjectContext;
use crate::selector::ExecutedTests;
use crate::store::RecordStore;
use crate::validator::{RecordValidation, SchemaValidator};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Structural state of a project after loading, validation and graph building
#[derive(Debug, Clone)]
pub struct ProjectAnalysis {
    pub store: RecordStore,
    pub validations: Vec<RecordValidation>,
    pub graph: TraceabilityGraph,
    /// All structural defects in canonical order
    pub defects: Vec<Defect>,
    pub files_scanned: usize,
}

impl ProjectAnalysis {
    pub fn invalid_record_count(&self) -> usize {
        self.validations.iter().filter(|v| !v.is_valid()).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub files_scanned: usize,
    pub requirements: usize,
    pub specifications: usize,
    pub invalid_records: usize,
    pub defects: usize,
    pub untraced_requirements: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub project: String,
    pub root: String,
    pub summary: AuditSummary,
    pub defects: Vec<Defect>,
    pub matrix: TraceabilityMatrix,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageReport>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.defects.is_empty()
    }
}

pub struct Auditor<'a> {
    context: &'a ProjectContext,
    loader: Box<dyn RecordLoader + 'a>,
    probe: Box<dyn FilesystemProbe + 'a>,
}

impl<'a> Auditor<'a> {
    /// Auditor reading YAML records and test files from the project root
    pub fn new(context: &'a ProjectContext) -> Self {
        let scanner = TestFunctionScanner::new(&context.config.test_function_prefix);
        Self {
            context,
            loader: Box::new(YamlRecordLoader::new(&context.config)),
            probe: Box::new(DiskProbe::new(&context.root, scanner)),
        }
    }

    pub fn with_loader(mut self, loader: impl RecordLoader + 'a) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn with_probe(mut self, probe: impl FilesystemProbe + 'a) -> Self {
        self.probe = Box::new(probe);
        self
    }

    /// Loads, validates and links every record of the project
    pub fn analyze(&self) -> ProjectAnalysis {
        let outcome = self.loader.load_all(&self.context.root);
        let files_scanned = outcome.files_scanned;

        let (store, mut defects) = RecordStore::build(outcome);

        let validator = SchemaValidator::new(self.context.config.selector_syntax());
        let validations = validator.validate_store(&store);
        defects.extend(validations.iter().flat_map(RecordValidation::to_defects));

        let (graph, graph_defects) = TraceabilityGraph::build(&store);
        defects.extend(graph_defects);

        canonicalize(&mut defects);

        log::info!(
            "{}: {} records from {} files, {} defects",
            self.context.name,
            store.len(),
            files_scanned,
            defects.len()
        );

        ProjectAnalysis {
            store,
            validations,
            graph,
            defects,
            files_scanned,
        }
    }

    /// Reconciles every specification of an analysed project against a test run
    pub fn reconcile(&self, analysis: &ProjectAnalysis, executed: &ExecutedTests) -> CoverageReport {
        CoverageReconciler::new(self.probe.as_ref(), self.context.config.selector_syntax())
            .reconcile(analysis.store.specifications(), executed)
    }

    /// Runs the full pipeline, including coverage when a test run is supplied
    pub fn run(&self, executed: Option<&ExecutedTests>) -> AuditReport {
        let analysis = self.analyze();
        let coverage = executed.map(|executed| self.reconcile(&analysis, executed));
        let matrix = TraceabilityMatrix::build(&analysis.store, &analysis.graph);

        AuditReport {
            project: self.context.name.clone(),
            root: self.context.root.display().to_string(),
            summary: AuditSummary {
                files_scanned: analysis.files_scanned,
                requirements: analysis.store.requirement_count(),
                specifications: analysis.store.specification_count(),
                invalid_records: analysis.invalid_record_count(),
                defects: analysis.defects.len(),
                untraced_requirements: matrix.untraced_requirements.len(),
            },
            defects: analysis.defects,
            matrix,
            coverage,
        }
    }
}

/// Audits several independent projects, returning reports in input order
pub fn audit_projects(contexts: &[ProjectContext]) -> Vec<AuditReport> {
    let audit = |context: &ProjectContext| Auditor::new(context).run(None);

    #[cfg(feature = "parallel")]
    let reports = contexts.par_iter().map(audit).collect();

    #[cfg(not(feature = "parallel"))]
    let reports = contexts.iter().map(audit).collect();

    reports
}
