//! Test target and executed-test selector parsing
//!
//! Both a specification's `unit_test` value and each line of an executed-test
//! list use the same two-part form: `<path>` names a whole test file,
//! `<path><delimiter><function>` names one test function in it. The delimiter
//! is configuration (default `::`), never guessed from file extensions.
//!
//! When the part after the first delimiter has several segments (pytest's
//! `file::Class::test_x`) the whole qualified name is kept, so tests of the
//! same name in different classes stay distinct. A parametrisation suffix
//! such as `[case-1]` is dropped.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("test target is empty")]
    Empty,

    #[error("test target `{0}` has no file path before the delimiter")]
    MissingFile(String),

    #[error("test target `{0}` has no function name after the delimiter")]
    MissingFunction(String),
}

/// Explicit parsing rule for test targets and selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorSyntax {
    delimiter: String,
}

impl Default for SelectorSyntax {
    fn default() -> Self {
        Self::new("::")
    }
}

impl SelectorSyntax {
    pub fn new(delimiter: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Parses `<path>` or `<path><delimiter><function>`
    pub fn parse(&self, raw: &str) -> Result<TestTarget, SelectorError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SelectorError::Empty);
        }

        let Some((file, rest)) = raw.split_once(self.delimiter.as_str()) else {
            return Ok(TestTarget::file(normalize_path(raw)));
        };

        let file = normalize_path(file);
        if file.is_empty() {
            return Err(SelectorError::MissingFile(raw.to_string()));
        }

        let segments: Vec<String> = rest
            .split(self.delimiter.as_str())
            .map(strip_parameters)
            .collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(SelectorError::MissingFunction(raw.to_string()));
        }

        Ok(TestTarget::function(file, segments.join(&self.delimiter)))
    }

    /// Last segment of a possibly class-qualified function name
    pub fn leaf<'f>(&self, function: &'f str) -> &'f str {
        function
            .rsplit(self.delimiter.as_str())
            .next()
            .unwrap_or(function)
    }

    pub fn is_qualified(&self, function: &str) -> bool {
        function.contains(self.delimiter.as_str())
    }

    /// Renders a target back into selector form
    pub fn format(&self, target: &TestTarget) -> String {
        match &target.function {
            Some(function) => format!("{}{}{}", target.file, self.delimiter, function),
            None => target.file.clone(),
        }
    }
}

/// A test file, optionally narrowed to one function
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestTarget {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
}

impl TestTarget {
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            function: None,
        }
    }

    pub fn function(file: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            function: Some(function.into()),
        }
    }
}

impl fmt::Display for TestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SelectorSyntax::default().format(self))
    }
}

/// Normalizes a path for comparison: forward slashes, no leading `./`
pub fn normalize_path(path: &str) -> String {
    let mut normalized = path.trim().replace('\\', "/");
    while let Some(stripped) = normalized.strip_prefix("./") {
        normalized = stripped.to_string();
    }
    normalized
}

fn strip_parameters(segment: &str) -> String {
    let segment = segment.trim();
    match segment.find('[') {
        Some(pos) if segment.ends_with(']') => segment[..pos].trim().to_string(),
        _ => segment.to_string(),
    }
}

/// Which parts of one test file were executed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileHits {
    /// A bare-file selector was present: every function counts as executed
    pub whole_file: bool,
    /// Functions as selected, class qualifier included
    pub functions: BTreeSet<String>,
    /// Unqualified names of the same functions
    pub names: BTreeSet<String>,
}

/// The executed-test feed, indexed by file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutedTests {
    by_file: BTreeMap<String, FileHits>,
    /// Lines that could not be parsed as selectors
    pub rejected: Vec<String>,
    #[serde(skip)]
    syntax: SelectorSyntax,
}

impl ExecutedTests {
    /// Parses a test list: one selector per line, blank lines and `#` comments ignored
    pub fn parse(content: &str, syntax: &SelectorSyntax) -> Self {
        let mut executed = ExecutedTests::empty(syntax);

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match syntax.parse(line) {
                Ok(target) => executed.insert(target),
                Err(e) => {
                    log::warn!("Ignoring executed-test selector: {}", e);
                    executed.rejected.push(line.to_string());
                }
            }
        }

        executed
    }

    /// Reads and parses a test list file
    pub fn from_file<P: AsRef<Path>>(path: P, syntax: &SelectorSyntax) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read test list file: {:?}", path.as_ref()))?;
        Ok(Self::parse(&content, syntax))
    }

    pub fn from_targets<I>(targets: I, syntax: &SelectorSyntax) -> Self
    where
        I: IntoIterator<Item = TestTarget>,
    {
        let mut executed = ExecutedTests::empty(syntax);
        for target in targets {
            executed.insert(target);
        }
        executed
    }

    fn empty(syntax: &SelectorSyntax) -> Self {
        Self {
            syntax: syntax.clone(),
            ..Default::default()
        }
    }

    fn insert(&mut self, target: TestTarget) {
        let hits = self.by_file.entry(target.file).or_default();
        match target.function {
            Some(function) => {
                hits.names.insert(self.syntax.leaf(&function).to_string());
                hits.functions.insert(function);
            }
            None => hits.whole_file = true,
        }
    }

    /// Hits recorded for one (normalized) file path
    pub fn hits(&self, file: &str) -> Option<&FileHits> {
        self.by_file.get(file)
    }

    /// Whether `function` in `file` was executed, directly or through a bare-file selector
    ///
    /// A class-qualified function needs a selector with the same qualifier. A
    /// plain name is matched against the last segment of every selector.
    pub fn covers(&self, file: &str, function: &str) -> bool {
        let Some(hits) = self.hits(file) else {
            return false;
        };
        if hits.whole_file {
            return true;
        }
        if self.syntax.is_qualified(function) {
            hits.functions.contains(function)
        } else {
            hits.names.contains(function)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.by_file.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_file() {
        let syntax = SelectorSyntax::default();
        assert_eq!(
            syntax.parse("./tests/test_auth.py").unwrap(),
            TestTarget::file("tests/test_auth.py")
        );
    }

    #[test]
    fn test_parse_file_and_function() {
        let syntax = SelectorSyntax::default();
        assert_eq!(
            syntax.parse("tests/test_auth.py::test_login").unwrap(),
            TestTarget::function("tests/test_auth.py", "test_login")
        );
    }

    #[test]
    fn test_parse_class_and_parameters() {
        let syntax = SelectorSyntax::default();
        assert_eq!(
            syntax
                .parse("tests/test_auth.py::TestLogin::test_lockout[3-attempts]")
                .unwrap(),
            TestTarget::function("tests/test_auth.py", "TestLogin::test_lockout")
        );
    }

    #[test]
    fn test_parse_custom_delimiter() {
        let syntax = SelectorSyntax::new("#");
        assert_eq!(
            syntax.parse("tests/test_auth.py#test_login").unwrap(),
            TestTarget::function("tests/test_auth.py", "test_login")
        );
        // With `#` as the delimiter, `::` is just part of the path
        assert_eq!(
            syntax.parse("tests/a::b").unwrap(),
            TestTarget::file("tests/a::b")
        );
    }

    #[test]
    fn test_parse_errors() {
        let syntax = SelectorSyntax::default();
        assert_eq!(syntax.parse("   "), Err(SelectorError::Empty));
        assert!(matches!(
            syntax.parse("::test_x"),
            Err(SelectorError::MissingFile(_))
        ));
        assert!(matches!(
            syntax.parse("tests/a.py::"),
            Err(SelectorError::MissingFunction(_))
        ));
        assert!(matches!(
            syntax.parse("tests/a.py::TestA::"),
            Err(SelectorError::MissingFunction(_))
        ));
    }

    #[test]
    fn test_normalize_windows_path() {
        assert_eq!(normalize_path(".\\tests\\test_a.py"), "tests/test_a.py");
    }

    #[test]
    fn test_executed_tests_skips_comments_and_blank_lines() {
        let content = "# run 42\n\ntests/test_a.py::test_one\n  tests/test_b.py  \nbroken.py::\n";
        let executed = ExecutedTests::parse(content, &SelectorSyntax::default());

        assert_eq!(executed.file_count(), 2);
        assert!(executed.covers("tests/test_a.py", "test_one"));
        assert!(!executed.covers("tests/test_a.py", "test_two"));
        assert!(executed.covers("tests/test_b.py", "anything"));
        assert_eq!(executed.rejected, vec!["broken.py::".to_string()]);
    }

    #[test]
    fn test_format_round_trips_function_target() {
        let syntax = SelectorSyntax::new("#");
        let target = TestTarget::function("tests/x.py", "test_y");
        assert_eq!(syntax.format(&target), "tests/x.py#test_y");
    }

    #[test]
    fn test_class_qualifier_keeps_same_named_tests_apart() {
        let syntax = SelectorSyntax::default();
        let executed = ExecutedTests::parse("tests/test_a.py::TestB::test_x\n", &syntax);

        assert!(executed.covers("tests/test_a.py", "TestB::test_x"));
        assert!(!executed.covers("tests/test_a.py", "TestA::test_x"));
        // A scanned name carries no class, so any selector ending in it counts
        assert!(executed.covers("tests/test_a.py", "test_x"));
    }

    #[test]
    fn test_unqualified_selector_does_not_cover_class_method() {
        let syntax = SelectorSyntax::default();
        let executed = ExecutedTests::from_targets(
            vec![
                TestTarget::function("tests/test_a.py", "test_x"),
                TestTarget::file("tests/test_b.py"),
            ],
            &syntax,
        );

        assert!(executed.covers("tests/test_a.py", "test_x"));
        assert!(!executed.covers("tests/test_a.py", "TestA::test_x"));
        assert!(executed.covers("tests/test_b.py", "TestA::test_x"));
        assert_eq!(executed.file_count(), 2);
    }

    #[test]
    fn test_leaf_uses_configured_delimiter() {
        let syntax = SelectorSyntax::new("#");
        assert_eq!(syntax.leaf("TestA#test_x"), "test_x");
        assert_eq!(syntax.leaf("test_x"), "test_x");
        assert!(!syntax.is_qualified("TestA::test_x"));
    }
}
