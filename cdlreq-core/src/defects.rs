//! Structured defect reporting
//!
//! Every stage of the pipeline reports problems as [`Defect`] values instead of
//! failing, so one pass surfaces the complete defect list for a project.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::SourceLocation;

/// Classes of defects found in a project's records
///
/// Declaration order is the canonical reporting order within one subject.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DefectKind {
    /// Structurally unreadable record; excluded from the store
    MalformedRecord,
    /// Two or more records declare the same identifier
    DuplicateIdentifier,
    /// A field constraint failure; the record is retained
    SchemaViolation,
    /// A cross-reference whose target does not exist
    DanglingReference,
    /// A cycle in the specification dependency graph
    DependencyCycle,
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefectKind::MalformedRecord => write!(f, "MalformedRecord"),
            DefectKind::DuplicateIdentifier => write!(f, "DuplicateIdentifier"),
            DefectKind::SchemaViolation => write!(f, "SchemaViolation"),
            DefectKind::DanglingReference => write!(f, "DanglingReference"),
            DefectKind::DependencyCycle => write!(f, "DependencyCycle"),
        }
    }
}

/// A single reported defect
///
/// Field order doubles as the canonical sort order: subject id, kind,
/// locations, field, message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Defect {
    /// Identifier of the record the defect belongs to, when one is known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub kind: DefectKind,
    pub locations: Vec<SourceLocation>,
    /// Offending field for schema violations and dangling references
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl Defect {
    pub fn new(kind: DefectKind, location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            subject: None,
            kind,
            locations: vec![location],
            field: None,
            message: message.into(),
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_locations(mut self, locations: Vec<SourceLocation>) -> Self {
        self.locations = locations;
        self
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(subject) = &self.subject {
            write!(f, " {}", subject)?;
        }
        if let Some(field) = &self.field {
            write!(f, " ({})", field)?;
        }
        write!(f, ": {}", self.message)?;
        let locations: Vec<String> = self.locations.iter().map(|l| l.to_string()).collect();
        if !locations.is_empty() {
            write!(f, " at {}", locations.join(", "))?;
        }
        Ok(())
    }
}

/// Sorts defects into canonical order and drops exact repeats
pub fn canonicalize(defects: &mut Vec<Defect>) {
    defects.sort();
    defects.dedup();
}
