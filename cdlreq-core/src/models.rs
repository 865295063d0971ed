use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identifier grammar for requirements (e.g., "REQ-SYS-001")
pub static REQUIREMENT_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^REQ-[A-Z0-9]{3,}-[0-9]{3,}$").expect("valid requirement id pattern"));

/// Identifier grammar for specifications (e.g., "SPEC-SYS-001")
pub static SPECIFICATION_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^SPEC-[A-Z0-9]{3,}-[0-9]{3,}$").expect("valid specification id pattern")
});

/// Maximum length of a record title, in characters
pub const MAX_TITLE_LENGTH: usize = 100;

/// Minimum length of a single acceptance criterion, in characters
pub const MIN_CRITERION_LENGTH: usize = 5;

/// The two kinds of traceability records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Requirement,
    Specification,
}

impl RecordKind {
    /// The identifier prefix that discriminates this kind
    pub fn prefix(&self) -> &'static str {
        match self {
            RecordKind::Requirement => "REQ-",
            RecordKind::Specification => "SPEC-",
        }
    }

    /// Determines the record kind from an identifier prefix
    pub fn from_id(id: &str) -> Option<Self> {
        if id.starts_with(RecordKind::Requirement.prefix()) {
            Some(RecordKind::Requirement)
        } else if id.starts_with(RecordKind::Specification.prefix()) {
            Some(RecordKind::Specification)
        } else {
            None
        }
    }

    /// Adds this kind's prefix to `id` unless it already carries it
    pub fn qualify(&self, id: &str) -> String {
        if id.starts_with(self.prefix()) {
            id.to_string()
        } else {
            format!("{}{}", self.prefix(), id)
        }
    }

    /// Checks an identifier against the full grammar for this kind
    pub fn is_valid_id(&self, id: &str) -> bool {
        match self {
            RecordKind::Requirement => REQUIREMENT_ID_PATTERN.is_match(id),
            RecordKind::Specification => SPECIFICATION_ID_PATTERN.is_match(id),
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Requirement => write!(f, "requirement"),
            RecordKind::Specification => write!(f, "specification"),
        }
    }
}

/// Represents the type of a requirement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RequirementType {
    Functional,
    Security,
    Performance,
    Usability,
    Reliability,
    Maintainability,
    Portability,
    Regulatory,
    Safety,
}

impl RequirementType {
    /// Get all requirement types in declaration order
    pub fn all() -> &'static [RequirementType] {
        &[
            RequirementType::Functional,
            RequirementType::Security,
            RequirementType::Performance,
            RequirementType::Usability,
            RequirementType::Reliability,
            RequirementType::Maintainability,
            RequirementType::Portability,
            RequirementType::Regulatory,
            RequirementType::Safety,
        ]
    }

    /// Parse a requirement type from its lowercase name
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.to_string() == s)
    }
}

impl fmt::Display for RequirementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementType::Functional => write!(f, "functional"),
            RequirementType::Security => write!(f, "security"),
            RequirementType::Performance => write!(f, "performance"),
            RequirementType::Usability => write!(f, "usability"),
            RequirementType::Reliability => write!(f, "reliability"),
            RequirementType::Maintainability => write!(f, "maintainability"),
            RequirementType::Portability => write!(f, "portability"),
            RequirementType::Regulatory => write!(f, "regulatory"),
            RequirementType::Safety => write!(f, "safety"),
        }
    }
}

/// A regulatory or functional obligation the system must satisfy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Requirement {
    /// Unique identifier (e.g., "REQ-SYS-001")
    pub id: String,

    /// Short title describing the requirement
    #[serde(default)]
    pub title: String,

    /// Detailed description of the requirement
    #[serde(default)]
    pub description: String,

    /// Requirement type name; membership in [`RequirementType`] is checked by the validator
    #[serde(rename = "type", default)]
    pub req_type: String,

    /// Conditions that must hold for the requirement to be satisfied
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,

    /// Tags for categorizing the requirement
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Where the requirement came from (standard, stakeholder, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Why the requirement exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// An implementation-facing record linking requirements to code and tests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Specification {
    /// Unique identifier (e.g., "SPEC-SYS-001")
    pub id: String,

    /// Short title describing the specification
    #[serde(default)]
    pub title: String,

    /// Detailed description of the specification
    #[serde(default)]
    pub description: String,

    /// Requirements this specification implements
    #[serde(default)]
    pub related_requirements: Vec<String>,

    /// Path to the implementing source unit
    #[serde(default)]
    pub implementation_unit: String,

    /// Test file, or test file plus function name joined by the selector delimiter
    #[serde(default)]
    pub unit_test: String,

    /// Criteria the unit test is expected to check
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_criteria: Vec<String>,

    /// Free-form design notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design_notes: Option<String>,

    /// Specifications this one depends on
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

/// A loaded record, tagged by kind
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    Requirement(Requirement),
    Specification(Specification),
}

impl Record {
    pub fn id(&self) -> &str {
        match self {
            Record::Requirement(r) => &r.id,
            Record::Specification(s) => &s.id,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Record::Requirement(_) => RecordKind::Requirement,
            Record::Specification(_) => RecordKind::Specification,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Record::Requirement(r) => &r.title,
            Record::Specification(s) => &s.title,
        }
    }

    pub fn as_requirement(&self) -> Option<&Requirement> {
        match self {
            Record::Requirement(r) => Some(r),
            Record::Specification(_) => None,
        }
    }

    pub fn as_specification(&self) -> Option<&Specification> {
        match self {
            Record::Specification(s) => Some(s),
            Record::Requirement(_) => None,
        }
    }
}

/// Where a record was read from
///
/// `path` is relative to the project root. `index` is set when the file holds
/// more than one record (multi-document YAML or a top-level sequence).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceLocation {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl SourceLocation {
    /// Location of a whole file
    pub fn file<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            index: None,
        }
    }

    /// Location of one record inside a multi-record file
    pub fn entry<P: Into<PathBuf>>(path: P, index: usize) -> Self {
        Self {
            path: path.into(),
            index: Some(index),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}[{}]", self.path.display(), index),
            None => write!(f, "{}", self.path.display()),
        }
    }
}
