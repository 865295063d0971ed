//! Schema validation for requirements and specifications
//!
//! Every constraint is checked and every failure collected; a record is never
//! rejected on its first problem. Invalid records stay in the store so later
//! stages can still report on them.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::defects::{Defect, DefectKind};
use crate::models::{
    Record, RecordKind, Requirement, RequirementType, SourceLocation, Specification,
    MAX_TITLE_LENGTH, MIN_CRITERION_LENGTH,
};
use crate::selector::SelectorSyntax;
use crate::store::{RecordStore, StoredRecord};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One failed constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result of validating a single record: all of its violations at once
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordValidation {
    pub id: String,
    pub kind: RecordKind,
    pub location: SourceLocation,
    pub violations: Vec<Violation>,
}

impl RecordValidation {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// One schema-violation defect per violation
    pub fn to_defects(&self) -> Vec<Defect> {
        self.violations
            .iter()
            .map(|v| {
                Defect::new(
                    DefectKind::SchemaViolation,
                    self.location.clone(),
                    v.message.clone(),
                )
                .with_subject(self.id.clone())
                .with_field(v.field.clone())
            })
            .collect()
    }
}

/// Validates record fields against the fixed rule set for each kind
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator {
    syntax: SelectorSyntax,
}

impl SchemaValidator {
    pub fn new(syntax: SelectorSyntax) -> Self {
        Self { syntax }
    }

    pub fn validate_record(&self, stored: &StoredRecord) -> RecordValidation {
        let mut violations = match &stored.record {
            Record::Requirement(req) => self.validate_requirement(req),
            Record::Specification(spec) => self.validate_specification(spec),
        };

        // A wrongly typed field reads as empty; report the type, not the emptiness
        violations.retain(|v| {
            !stored
                .field_errors
                .iter()
                .any(|e| v.field == e.field || v.field.starts_with(&format!("{}[", e.field)))
        });
        for error in &stored.field_errors {
            violations.push(Violation::new(error.field.clone(), error.message.clone()));
        }

        for field in &stored.unknown_fields {
            violations.push(Violation::new(
                field.clone(),
                format!("unknown field `{}` for a {}", field, stored.record.kind()),
            ));
        }

        RecordValidation {
            id: stored.id().to_string(),
            kind: stored.record.kind(),
            location: stored.location.clone(),
            violations,
        }
    }

    pub fn validate_requirement(&self, req: &Requirement) -> Vec<Violation> {
        let mut violations = Vec::new();

        check_id(RecordKind::Requirement, "id", &req.id, &mut violations);
        check_title(&req.title, &mut violations);
        check_not_blank("description", &req.description, &mut violations);

        if RequirementType::parse(&req.req_type).is_none() {
            let allowed: Vec<String> = RequirementType::all().iter().map(|t| t.to_string()).collect();
            violations.push(Violation::new(
                "type",
                format!(
                    "invalid requirement type `{}` (expected one of: {})",
                    req.req_type,
                    allowed.join(", ")
                ),
            ));
        }

        if req.acceptance_criteria.is_empty() {
            violations.push(Violation::new(
                "acceptance_criteria",
                "at least one acceptance criterion is required",
            ));
        }
        for (i, criterion) in req.acceptance_criteria.iter().enumerate() {
            if criterion.chars().count() < MIN_CRITERION_LENGTH {
                violations.push(Violation::new(
                    format!("acceptance_criteria[{}]", i),
                    format!(
                        "acceptance criterion must be at least {} characters: `{}`",
                        MIN_CRITERION_LENGTH, criterion
                    ),
                ));
            }
        }

        for (i, tag) in req.tags.iter().enumerate() {
            check_not_blank(&format!("tags[{}]", i), tag, &mut violations);
        }
        check_unique("tags", &req.tags, &mut violations);

        violations
    }

    pub fn validate_specification(&self, spec: &Specification) -> Vec<Violation> {
        let mut violations = Vec::new();

        check_id(RecordKind::Specification, "id", &spec.id, &mut violations);
        check_title(&spec.title, &mut violations);
        check_not_blank("description", &spec.description, &mut violations);

        if spec.related_requirements.is_empty() {
            violations.push(Violation::new(
                "related_requirements",
                "at least one related requirement is required",
            ));
        }
        for (i, req_id) in spec.related_requirements.iter().enumerate() {
            check_id(
                RecordKind::Requirement,
                &format!("related_requirements[{}]", i),
                req_id,
                &mut violations,
            );
        }
        check_unique("related_requirements", &spec.related_requirements, &mut violations);

        check_not_blank("implementation_unit", &spec.implementation_unit, &mut violations);

        if let Err(e) = self.syntax.parse(&spec.unit_test) {
            violations.push(Violation::new("unit_test", e.to_string()));
        }

        for (i, criterion) in spec.test_criteria.iter().enumerate() {
            check_not_blank(&format!("test_criteria[{}]", i), criterion, &mut violations);
        }

        for (i, dep_id) in spec.dependencies.iter().enumerate() {
            check_id(
                RecordKind::Specification,
                &format!("dependencies[{}]", i),
                dep_id,
                &mut violations,
            );
        }
        check_unique("dependencies", &spec.dependencies, &mut violations);

        violations
    }

    /// Validates every record in the store, in identifier order
    pub fn validate_store(&self, store: &RecordStore) -> Vec<RecordValidation> {
        let records: Vec<&StoredRecord> = store.records().collect();

        #[cfg(feature = "parallel")]
        let mut validations: Vec<RecordValidation> =
            records.par_iter().map(|r| self.validate_record(r)).collect();

        #[cfg(not(feature = "parallel"))]
        let mut validations: Vec<RecordValidation> =
            records.iter().map(|r| self.validate_record(r)).collect();

        validations.sort_by(|a, b| a.id.cmp(&b.id));
        validations
    }
}

fn check_id(kind: RecordKind, field: &str, id: &str, violations: &mut Vec<Violation>) {
    if !kind.is_valid_id(id) {
        violations.push(Violation::new(
            field,
            format!(
                "`{}` is not a valid {} id (expected {}<ALNUM{{3,}}>-<DIGIT{{3,}}>)",
                id,
                kind,
                kind.prefix()
            ),
        ));
    }
}

fn check_title(title: &str, violations: &mut Vec<Violation>) {
    check_not_blank("title", title, violations);
    let length = title.chars().count();
    if length > MAX_TITLE_LENGTH {
        violations.push(Violation::new(
            "title",
            format!(
                "title is {} characters long (maximum {})",
                length, MAX_TITLE_LENGTH
            ),
        ));
    }
}

fn check_not_blank(field: &str, value: &str, violations: &mut Vec<Violation>) {
    if value.trim().is_empty() {
        violations.push(Violation::new(field, format!("{} must not be empty", field)));
    }
}

fn check_unique(field: &str, items: &[String], violations: &mut Vec<Violation>) {
    let mut seen = BTreeSet::new();
    let mut reported = BTreeSet::new();
    for item in items.iter().filter(|item| !item.trim().is_empty()) {
        if !seen.insert(item.as_str()) && reported.insert(item.as_str()) {
            violations.push(Violation::new(
                field,
                format!("duplicate entry `{}`", item),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FieldError;

    fn requirement() -> Requirement {
        Requirement {
            id: "REQ-SYS-001".to_string(),
            title: "System shall authenticate users".to_string(),
            description: "Secure authentication using industry-standard methods".to_string(),
            req_type: "security".to_string(),
            acceptance_criteria: vec![
                "User can log in with valid credentials".to_string(),
                "Invalid credentials are rejected".to_string(),
            ],
            tags: vec!["authentication".to_string(), "security".to_string()],
            source: None,
            rationale: None,
        }
    }

    fn specification() -> Specification {
        Specification {
            id: "SPEC-SYS-001".to_string(),
            title: "User authentication implementation".to_string(),
            description: "OAuth 2.0 login".to_string(),
            related_requirements: vec!["REQ-SYS-001".to_string()],
            implementation_unit: "src/auth/authentication.py".to_string(),
            unit_test: "tests/test_authentication.py".to_string(),
            test_criteria: Vec::new(),
            design_notes: None,
            dependencies: vec!["SPEC-SYS-002".to_string()],
        }
    }

    #[test]
    fn test_valid_records_have_no_violations() {
        let validator = SchemaValidator::default();
        assert!(validator.validate_requirement(&requirement()).is_empty());
        assert!(validator.validate_specification(&specification()).is_empty());
    }

    #[test]
    fn test_function_unit_test_is_valid() {
        let mut spec = specification();
        spec.unit_test = "tests/test_authentication.py::test_login".to_string();
        assert!(SchemaValidator::default()
            .validate_specification(&spec)
            .is_empty());
    }

    #[test]
    fn test_all_requirement_violations_collected() {
        let mut req = requirement();
        req.id = "REQ-S-1".to_string();
        req.title = "x".repeat(101);
        req.description = "  ".to_string();
        req.req_type = "cosmetic".to_string();
        req.acceptance_criteria = vec!["ok".to_string()];
        req.tags = vec!["a".to_string(), "a".to_string(), "a".to_string()];

        let violations = SchemaValidator::default().validate_requirement(&req);
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();

        assert_eq!(
            fields,
            vec![
                "id",
                "title",
                "description",
                "type",
                "acceptance_criteria[0]",
                "tags"
            ]
        );
    }

    #[test]
    fn test_empty_acceptance_criteria_rejected() {
        let mut req = requirement();
        req.acceptance_criteria.clear();
        let violations = SchemaValidator::default().validate_requirement(&req);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "acceptance_criteria");
    }

    #[test]
    fn test_all_specification_violations_collected() {
        let mut spec = specification();
        spec.title = String::new();
        spec.related_requirements = vec![
            "REQ-SYS-001".to_string(),
            "SPEC-SYS-001".to_string(),
            "REQ-SYS-001".to_string(),
        ];
        spec.implementation_unit = String::new();
        spec.unit_test = "tests/test_a.py::".to_string();
        spec.dependencies = vec!["REQ-SYS-001".to_string()];

        let violations = SchemaValidator::default().validate_specification(&spec);
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();

        assert_eq!(
            fields,
            vec![
                "title",
                "related_requirements[1]",
                "related_requirements",
                "implementation_unit",
                "unit_test",
                "dependencies[0]",
            ]
        );
    }

    #[test]
    fn test_unknown_fields_and_defects() {
        let mut stored = StoredRecord::new(
            SourceLocation::file("requirements/auth.yaml"),
            Record::Requirement(requirement()),
        );
        stored.unknown_fields = vec!["owner".to_string()];

        let validation = SchemaValidator::default().validate_record(&stored);
        assert!(!validation.is_valid());

        let defects = validation.to_defects();
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].kind, DefectKind::SchemaViolation);
        assert_eq!(defects[0].subject.as_deref(), Some("REQ-SYS-001"));
        assert_eq!(defects[0].field.as_deref(), Some("owner"));
    }

    #[test]
    fn test_validate_store_retains_invalid_records() {
        let mut bad = requirement();
        bad.id = "REQ-SYS-002".to_string();
        bad.req_type = "nope".to_string();
        let (store, _) = RecordStore::from_records(vec![
            StoredRecord::new(SourceLocation::file("b.yaml"), Record::Requirement(bad)),
            StoredRecord::new(
                SourceLocation::file("a.yaml"),
                Record::Requirement(requirement()),
            ),
        ]);

        let validations = SchemaValidator::default().validate_store(&store);

        assert_eq!(validations.len(), 2);
        assert_eq!(validations[0].id, "REQ-SYS-001");
        assert!(validations[0].is_valid());
        assert!(!validations[1].is_valid());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_criterion_length_counts_surrounding_whitespace() {
        let mut req = requirement();
        req.acceptance_criteria = vec!["  abc  ".to_string(), "abcd".to_string()];
        let violations = SchemaValidator::default().validate_requirement(&req);
        let fields: Vec<&str> = violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(fields, vec!["acceptance_criteria[1]"]);
    }

    #[test]
    fn test_field_errors_replace_emptiness_violations() {
        let mut req = requirement();
        req.title = String::new();
        req.acceptance_criteria = vec![String::new(), "Lockout after five attempts".to_string()];
        let mut stored = StoredRecord::new(
            SourceLocation::file("requirements/auth.yaml"),
            Record::Requirement(req),
        );
        stored.field_errors = vec![
            FieldError {
                field: "title".to_string(),
                message: "title must be a string, found a list".to_string(),
            },
            FieldError {
                field: "acceptance_criteria[0]".to_string(),
                message: "acceptance_criteria[0] must be a string, found a number".to_string(),
            },
        ];

        let validation = SchemaValidator::default().validate_record(&stored);
        let messages: Vec<&str> = validation
            .violations
            .iter()
            .map(|v| v.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec![
                "title must be a string, found a list",
                "acceptance_criteria[0] must be a string, found a number",
            ]
        );
    }
}
