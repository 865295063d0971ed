//! Coverage reconciliation
//!
//! Matches each specification's declared `unit_test` against the tests that
//! were actually executed, at function granularity. A target naming a whole
//! file is only fully covered when every test function declared in that file
//! ran. The reconciler reads the filesystem through a [`FilesystemProbe`] and
//! never touches the record store.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::models::Specification;
use crate::probe::FilesystemProbe;
use crate::selector::{ExecutedTests, SelectorSyntax, TestTarget};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CoverageVerdict {
    /// Every targeted test function was executed
    Covered,
    /// Some, but not all, test functions in the target file were executed
    PartiallyCovered,
    /// No targeted test function was executed, or the file declares none
    NotCovered,
    /// The target itself is broken: unparsable, missing or unreadable
    TargetInvalid,
}

impl fmt::Display for CoverageVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageVerdict::Covered => write!(f, "Covered"),
            CoverageVerdict::PartiallyCovered => write!(f, "PartiallyCovered"),
            CoverageVerdict::NotCovered => write!(f, "NotCovered"),
            CoverageVerdict::TargetInvalid => write!(f, "TargetInvalid"),
        }
    }
}

/// Verdict and evidence for one specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecCoverage {
    pub specification: String,
    /// The `unit_test` value as written in the record
    pub unit_test: String,
    pub verdict: CoverageVerdict,
    /// Resolved test file and optional function
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TestTarget>,
    /// Test functions found in (or named by) the target
    pub discovered: BTreeSet<String>,
    pub matched: BTreeSet<String>,
    pub unmatched: BTreeSet<String>,
    /// Why the target is invalid or trivially uncovered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SpecCoverage {
    fn invalid(spec: &Specification, target: Option<TestTarget>, reason: String) -> Self {
        Self {
            specification: spec.id.clone(),
            unit_test: spec.unit_test.clone(),
            verdict: CoverageVerdict::TargetInvalid,
            target,
            discovered: BTreeSet::new(),
            matched: BTreeSet::new(),
            unmatched: BTreeSet::new(),
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageSummary {
    pub total: usize,
    pub covered: usize,
    pub partially_covered: usize,
    pub not_covered: usize,
    pub target_invalid: usize,
}

impl CoverageSummary {
    fn count(&mut self, verdict: CoverageVerdict) {
        self.total += 1;
        match verdict {
            CoverageVerdict::Covered => self.covered += 1,
            CoverageVerdict::PartiallyCovered => self.partially_covered += 1,
            CoverageVerdict::NotCovered => self.not_covered += 1,
            CoverageVerdict::TargetInvalid => self.target_invalid += 1,
        }
    }
}

/// Coverage analysis results for one project and one test run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoverageReport {
    /// One entry per specification, in identifier order
    pub specifications: Vec<SpecCoverage>,
    pub summary: CoverageSummary,
    /// Executed-test lines that were not valid selectors
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected_selectors: Vec<String>,
}

impl CoverageReport {
    pub fn get(&self, specification_id: &str) -> Option<&SpecCoverage> {
        self.specifications
            .iter()
            .find(|c| c.specification == specification_id)
    }

    /// Percentage of specifications that are fully covered (0.0 - 100.0)
    pub fn coverage_percent(&self) -> f64 {
        if self.summary.total == 0 {
            return 100.0;
        }
        (self.summary.covered as f64 / self.summary.total as f64) * 100.0
    }

    /// Whether the report should pass a CI gate: no invalid targets, >= threshold coverage
    pub fn is_passing(&self, threshold: f64) -> bool {
        self.summary.target_invalid == 0 && self.coverage_percent() >= threshold
    }
}

/// Scan result for one test file, shared by every specification targeting it
type ScanResult = Result<BTreeSet<String>, String>;

pub struct CoverageReconciler<'a> {
    probe: &'a dyn FilesystemProbe,
    syntax: SelectorSyntax,
}

impl<'a> CoverageReconciler<'a> {
    pub fn new(probe: &'a dyn FilesystemProbe, syntax: SelectorSyntax) -> Self {
        Self { probe, syntax }
    }

    pub fn reconcile<'s, I>(&self, specifications: I, executed: &ExecutedTests) -> CoverageReport
    where
        I: IntoIterator<Item = &'s Specification>,
    {
        let resolved: Vec<(&Specification, Result<TestTarget, String>)> = specifications
            .into_iter()
            .map(|spec| (spec, self.resolve(spec)))
            .collect();

        // Scan every whole-file target once, however many specifications share it
        let files: BTreeSet<&str> = resolved
            .iter()
            .filter_map(|(_, target)| target.as_ref().ok())
            .filter(|target| target.function.is_none())
            .map(|target| target.file.as_str())
            .collect();
        let scans = self.scan_files(files);

        let mut entries: Vec<SpecCoverage> = resolved
            .into_iter()
            .map(|(spec, target)| match target {
                Err(reason) => SpecCoverage::invalid(spec, None, reason),
                Ok(target) => self.assess(spec, target, &scans, executed),
            })
            .collect();
        entries.sort_by(|a, b| a.specification.cmp(&b.specification));

        let mut summary = CoverageSummary::default();
        for entry in &entries {
            summary.count(entry.verdict);
        }

        log::info!(
            "Coverage: {} covered, {} partial, {} not covered, {} invalid of {} specifications",
            summary.covered,
            summary.partially_covered,
            summary.not_covered,
            summary.target_invalid,
            summary.total
        );

        CoverageReport {
            specifications: entries,
            summary,
            rejected_selectors: executed.rejected.clone(),
        }
    }

    fn resolve(&self, spec: &Specification) -> Result<TestTarget, String> {
        let target = self.syntax.parse(&spec.unit_test).map_err(|e| e.to_string())?;
        if !self.probe.exists(&target.file) {
            return Err(format!("test file {} does not exist", target.file));
        }
        Ok(target)
    }

    fn scan_files(&self, files: BTreeSet<&str>) -> BTreeMap<String, ScanResult> {
        let scan = |file: &str| -> (String, ScanResult) {
            let result = self.probe.list_test_functions(file).map_err(|e| {
                log::warn!("{}", e);
                e.to_string()
            });
            (file.to_string(), result)
        };

        #[cfg(feature = "parallel")]
        let scans = files.into_par_iter().map(scan).collect();

        #[cfg(not(feature = "parallel"))]
        let scans = files.into_iter().map(scan).collect();

        scans
    }

    fn assess(
        &self,
        spec: &Specification,
        target: TestTarget,
        scans: &BTreeMap<String, ScanResult>,
        executed: &ExecutedTests,
    ) -> SpecCoverage {
        let scanned = match target.function.clone() {
            Some(function) => Ok(BTreeSet::from([function])),
            None => match scans.get(&target.file) {
                Some(Ok(functions)) => Ok(functions.clone()),
                Some(Err(reason)) => Err(reason.clone()),
                None => Err(format!("test file {} was not scanned", target.file)),
            },
        };
        let discovered = match scanned {
            Ok(discovered) => discovered,
            Err(reason) => return SpecCoverage::invalid(spec, Some(target), reason),
        };

        let (matched, unmatched): (BTreeSet<String>, BTreeSet<String>) = discovered
            .iter()
            .cloned()
            .partition(|function| executed.covers(&target.file, function));

        let (verdict, reason) = if discovered.is_empty() {
            (
                CoverageVerdict::NotCovered,
                Some(format!("test file {} declares no test functions", target.file)),
            )
        } else if unmatched.is_empty() {
            (CoverageVerdict::Covered, None)
        } else if matched.is_empty() {
            (CoverageVerdict::NotCovered, None)
        } else {
            (CoverageVerdict::PartiallyCovered, None)
        };

        SpecCoverage {
            specification: spec.id.clone(),
            unit_test: spec.unit_test.clone(),
            verdict,
            target: Some(target),
            discovered,
            matched,
            unmatched,
            reason,
        }
    }
}
