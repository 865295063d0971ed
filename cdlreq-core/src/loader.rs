//! Record loading from YAML files
//!
//! The loader only finds record-shaped YAML documents and hands them on as raw
//! mappings; turning them into typed records is the store's job. A file that is
//! not valid YAML is reported as a failure for that file alone and loading
//! carries on with the rest of the project.

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::config::ProjectConfig;
use crate::models::SourceLocation;

/// Keys that only appear on traceability records
const RECORD_KEYS: &[&str] = &["id", "acceptance_criteria", "related_requirements", "unit_test"];

/// A record-shaped YAML mapping and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub location: SourceLocation,
    pub fields: Mapping,
}

/// A file that could not be read or parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub location: SourceLocation,
    pub message: String,
}

/// Everything a loader found under a project root
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub records: Vec<RawRecord>,
    pub failures: Vec<LoadFailure>,
    /// Number of record files visited
    pub files_scanned: usize,
}

/// Source of raw records for a project
pub trait RecordLoader: Send + Sync {
    /// Loads every record candidate under `root`; never fails as a whole
    fn load_all(&self, root: &Path) -> LoadOutcome;
}

/// Loads records from `.yaml`/`.yml` files anywhere below the project root
pub struct YamlRecordLoader {
    extensions: Vec<String>,
    exclude: Vec<String>,
}

impl YamlRecordLoader {
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            extensions: config.record_extensions.clone(),
            exclude: config.exclude.clone(),
        }
    }

    fn is_skipped(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || (entry.file_type().is_dir() && self.exclude.iter().any(|e| *e == name))
    }

    fn is_record_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }

    /// Extracts record candidates from the text of one file
    pub fn parse_content(&self, path: &Path, content: &str) -> Result<Vec<RawRecord>, String> {
        let mut documents = Vec::new();
        for document in serde_yaml::Deserializer::from_str(content) {
            let value = Value::deserialize(document).map_err(|e| e.to_string())?;
            documents.push(value);
        }

        // A file holding a single mapping is addressed by path alone
        if let [Value::Mapping(mapping)] = documents.as_slice() {
            if is_candidate(mapping) {
                return Ok(vec![RawRecord {
                    location: SourceLocation::file(path),
                    fields: mapping.clone(),
                }]);
            }
            return Ok(Vec::new());
        }

        let entries = documents.into_iter().flat_map(|document| match document {
            Value::Sequence(items) => items,
            other => vec![other],
        });

        let mut records = Vec::new();
        for (index, entry) in entries.enumerate() {
            if let Value::Mapping(mapping) = entry {
                if is_candidate(&mapping) {
                    records.push(RawRecord {
                        location: SourceLocation::entry(path, index),
                        fields: mapping,
                    });
                }
            }
        }
        Ok(records)
    }
}

impl RecordLoader for YamlRecordLoader {
    fn load_all(&self, root: &Path) -> LoadOutcome {
        let mut outcome = LoadOutcome::default();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_skipped(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    log::warn!("Skipping unreadable path {:?}: {}", path, e);
                    outcome.failures.push(LoadFailure {
                        location: SourceLocation::file(relative_to(root, &path)),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() || !self.is_record_file(entry.path()) {
                continue;
            }

            let relative = relative_to(root, entry.path());
            outcome.files_scanned += 1;

            let content = match fs::read_to_string(entry.path()) {
                Ok(content) => content,
                Err(e) => {
                    outcome.failures.push(LoadFailure {
                        location: SourceLocation::file(&relative),
                        message: format!("Error reading file: {}", e),
                    });
                    continue;
                }
            };

            match self.parse_content(&relative, &content) {
                Ok(records) => {
                    if records.is_empty() {
                        log::debug!("No records in {:?}", relative);
                    }
                    outcome.records.extend(records);
                }
                Err(message) => outcome.failures.push(LoadFailure {
                    location: SourceLocation::file(&relative),
                    message: format!("Invalid YAML syntax: {}", message),
                }),
            }
        }

        log::debug!(
            "Loaded {} record candidates from {} files ({} failures)",
            outcome.records.len(),
            outcome.files_scanned,
            outcome.failures.len()
        );
        outcome
    }
}

fn is_candidate(mapping: &Mapping) -> bool {
    RECORD_KEYS.iter().any(|key| mapping.contains_key(*key))
}

fn relative_to(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn loader() -> YamlRecordLoader {
        YamlRecordLoader::new(&ProjectConfig::default())
    }

    #[test]
    fn test_single_mapping_located_by_path() {
        let records = loader()
            .parse_content(Path::new("req.yaml"), "id: REQ-SYS-001\ntitle: T\n")
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location, SourceLocation::file("req.yaml"));
    }

    #[test]
    fn test_multi_document_and_sequences_are_indexed() {
        let content = "id: REQ-SYS-001\n---\n- id: REQ-SYS-002\n- name: not a record\n- id: SPEC-SYS-001\n";
        let records = loader()
            .parse_content(Path::new("all.yaml"), content)
            .unwrap();

        let locations: Vec<String> = records.iter().map(|r| r.location.to_string()).collect();
        assert_eq!(locations, vec!["all.yaml[0]", "all.yaml[1]", "all.yaml[3]"]);
    }

    #[test]
    fn test_non_record_documents_ignored() {
        let records = loader()
            .parse_content(Path::new("ci.yaml"), "name: CI\non: [push]\n")
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(loader()
            .parse_content(Path::new("bad.yaml"), "id: [unclosed\n")
            .is_err());
    }

    #[test]
    fn test_load_all_walks_sorted_and_skips_hidden_and_excluded() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("requirements/specifications")).unwrap();
        fs::create_dir_all(root.join(".github")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();

        fs::write(root.join("requirements/b.yaml"), "id: REQ-SYS-002\n").unwrap();
        fs::write(root.join("requirements/a.yml"), "id: REQ-SYS-001\n").unwrap();
        fs::write(
            root.join("requirements/specifications/s.yaml"),
            "id: SPEC-SYS-001\n",
        )
        .unwrap();
        fs::write(root.join(".github/ci.yaml"), "id: REQ-HID-001\n").unwrap();
        fs::write(root.join("node_modules/pkg/x.yaml"), "id: REQ-DEP-001\n").unwrap();
        fs::write(root.join("broken.yaml"), "id: [\n").unwrap();
        fs::write(root.join("notes.txt"), "id: REQ-TXT-001\n").unwrap();

        let outcome = loader().load_all(root);

        let paths: Vec<PathBuf> = outcome
            .records
            .iter()
            .map(|r| r.location.path.clone())
            .collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("requirements/a.yml"),
                PathBuf::from("requirements/b.yaml"),
                PathBuf::from("requirements/specifications/s.yaml"),
            ]
        );
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].location, SourceLocation::file("broken.yaml"));
        assert_eq!(outcome.files_scanned, 4);
    }
}
