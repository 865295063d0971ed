//! Identifier-indexed record store
//!
//! Built once per run from a [`LoadOutcome`] and read-only afterwards. Records
//! are keyed by identifier, never by file: where a record lives is only kept
//! for reporting.

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

use crate::defects::{Defect, DefectKind};
use crate::loader::{LoadOutcome, RawRecord};
use crate::models::{Record, RecordKind, Requirement, SourceLocation, Specification};

/// A typed record plus what the validator needs to know about its source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub location: SourceLocation,
    pub record: Record,
    /// Top-level fields that are not part of the record's schema
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown_fields: Vec<String>,
    /// Fields present with the wrong YAML type; they read as empty in `record`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_errors: Vec<FieldError>,
}

/// A field whose value has the wrong shape for its record kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl StoredRecord {
    pub fn new(location: SourceLocation, record: Record) -> Self {
        Self {
            location,
            record,
            unknown_fields: Vec::new(),
            field_errors: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        self.record.id()
    }
}

/// All well-formed records of one project, keyed by identifier
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: BTreeMap<String, StoredRecord>,
}

impl RecordStore {
    /// Converts loader output into a store, reporting malformed and duplicate records
    pub fn build(outcome: LoadOutcome) -> (Self, Vec<Defect>) {
        let mut defects: Vec<Defect> = outcome
            .failures
            .into_iter()
            .map(|failure| {
                Defect::new(DefectKind::MalformedRecord, failure.location, failure.message)
            })
            .collect();

        let mut raw_records = outcome.records;
        raw_records.sort_by(|a, b| a.location.cmp(&b.location));

        let mut typed = Vec::with_capacity(raw_records.len());
        for raw in raw_records {
            match convert(raw) {
                Ok(stored) => typed.push(stored),
                Err(defect) => {
                    log::warn!("{}", defect);
                    defects.push(defect);
                }
            }
        }

        let (store, duplicate_defects) = Self::from_records(typed);
        defects.extend(duplicate_defects);
        (store, defects)
    }

    /// Indexes typed records; the first record for an identifier wins
    pub fn from_records(records: Vec<StoredRecord>) -> (Self, Vec<Defect>) {
        let mut store = RecordStore::default();
        let mut duplicates: BTreeMap<String, Vec<SourceLocation>> = BTreeMap::new();

        for stored in records {
            let id = stored.id().to_string();
            match store.records.get(&id) {
                Some(existing) => {
                    duplicates
                        .entry(id)
                        .or_insert_with(|| vec![existing.location.clone()])
                        .push(stored.location);
                }
                None => {
                    store.records.insert(id, stored);
                }
            }
        }

        let defects = duplicates
            .into_iter()
            .map(|(id, locations)| {
                let kept = locations[0].clone();
                Defect::new(
                    DefectKind::DuplicateIdentifier,
                    kept.clone(),
                    format!(
                        "identifier declared {} times; keeping the record at {}",
                        locations.len(),
                        kept
                    ),
                )
                .with_subject(id)
                .with_locations(locations)
            })
            .collect();

        (store, defects)
    }

    pub fn get(&self, id: &str) -> Option<&StoredRecord> {
        self.records.get(id)
    }

    pub fn location(&self, id: &str) -> Option<&SourceLocation> {
        self.records.get(id).map(|r| &r.location)
    }

    /// Whether a record of the given kind exists under `id`
    pub fn contains(&self, kind: RecordKind, id: &str) -> bool {
        self.records
            .get(id)
            .map(|r| r.record.kind() == kind)
            .unwrap_or(false)
    }

    /// All records in identifier order
    pub fn records(&self) -> impl Iterator<Item = &StoredRecord> {
        self.records.values()
    }

    /// Requirements in identifier order
    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.records.values().filter_map(|r| r.record.as_requirement())
    }

    /// Specifications in identifier order
    pub fn specifications(&self) -> impl Iterator<Item = &Specification> {
        self.records.values().filter_map(|r| r.record.as_specification())
    }

    pub fn requirement_count(&self) -> usize {
        self.requirements().count()
    }

    pub fn specification_count(&self) -> usize {
        self.specifications().count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn convert(raw: RawRecord) -> Result<StoredRecord, Defect> {
    let RawRecord { location, fields } = raw;
    let malformed = |message: String| Defect::new(DefectKind::MalformedRecord, location.clone(), message);

    let id = match fields.get("id") {
        None => return Err(malformed("missing required field `id`".to_string())),
        Some(Value::String(id)) => id.clone(),
        Some(_) => return Err(malformed("field `id` must be a string".to_string())),
    };

    let Some(kind) = RecordKind::from_id(&id) else {
        return Err(malformed(format!(
            "cannot determine record kind from id `{}` (expected a REQ- or SPEC- prefix)",
            id
        ))
        .with_subject(id));
    };

    let mut reader = FieldReader::new(fields);
    reader.take("id");

    let record = match kind {
        RecordKind::Requirement => Record::Requirement(Requirement {
            id,
            title: reader.string("title"),
            description: reader.string("description"),
            req_type: reader.string("type"),
            acceptance_criteria: reader.strings("acceptance_criteria"),
            tags: reader.strings("tags"),
            source: reader.optional_string("source"),
            rationale: reader.optional_string("rationale"),
        }),
        RecordKind::Specification => Record::Specification(Specification {
            id,
            title: reader.string("title"),
            description: reader.string("description"),
            related_requirements: reader.strings("related_requirements"),
            implementation_unit: reader.string("implementation_unit"),
            unit_test: reader.string("unit_test"),
            test_criteria: reader.strings("test_criteria"),
            design_notes: reader.optional_string("design_notes"),
            dependencies: reader.strings("dependencies"),
        }),
    };

    let (field_errors, unknown_fields) = reader.finish();
    Ok(StoredRecord {
        location,
        record,
        unknown_fields,
        field_errors,
    })
}

/// Pulls typed fields out of a raw mapping without giving up on the first bad one
///
/// A missing field reads as empty so the validator can report it with the
/// rest. A field of the wrong type also reads as empty and leaves a
/// [`FieldError`] behind.
struct FieldReader {
    fields: Mapping,
    errors: Vec<FieldError>,
}

impl FieldReader {
    fn new(fields: Mapping) -> Self {
        Self {
            fields,
            errors: Vec::new(),
        }
    }

    fn take(&mut self, name: &str) -> Option<Value> {
        match self.fields.remove(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    fn error(&mut self, field: String, expected: &str, found: &Value) {
        self.errors.push(FieldError {
            message: format!("{} must be {}, found {}", field, expected, describe(found)),
            field,
        });
    }

    fn string(&mut self, name: &str) -> String {
        self.optional_string(name).unwrap_or_default()
    }

    fn optional_string(&mut self, name: &str) -> Option<String> {
        match self.take(name)? {
            Value::String(s) => Some(s),
            other => {
                self.error(name.to_string(), "a string", &other);
                None
            }
        }
    }

    fn strings(&mut self, name: &str) -> Vec<String> {
        let items = match self.take(name) {
            None => return Vec::new(),
            Some(Value::Sequence(items)) => items,
            Some(other) => {
                self.error(name.to_string(), "a list of strings", &other);
                return Vec::new();
            }
        };

        // Bad items stay as empty placeholders so later indices keep their meaning
        let mut values = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            match item {
                Value::String(s) => values.push(s),
                other => {
                    self.error(format!("{}[{}]", name, i), "a string", &other);
                    values.push(String::new());
                }
            }
        }
        values
    }

    /// Type errors, then whatever keys were never read, sorted
    fn finish(self) -> (Vec<FieldError>, Vec<String>) {
        let mut unknown: Vec<String> = self
            .fields
            .keys()
            .map(|key| key.as_str().map(String::from).unwrap_or_else(|| render_key(key)))
            .collect();
        unknown.sort();
        (self.errors, unknown)
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn render_key(key: &Value) -> String {
    serde_yaml::to_string(key)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| format!("{:?}", key))
}
