//! Filesystem access for the coverage reconciler
//!
//! The reconciler only needs to know whether a test file exists and which test
//! functions it declares. [`DiskProbe`] answers both from the project tree;
//! tests substitute an in-memory probe.

use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ProbeError;

pub trait FilesystemProbe: Send + Sync {
    /// Whether `path` names an existing file
    fn exists(&self, path: &str) -> bool;

    /// Names of the test functions declared in `path`
    fn list_test_functions(&self, path: &str) -> Result<BTreeSet<String>, ProbeError>;
}

/// Finds test function definitions by naming convention
///
/// Recognises Python `def`/`async def` and Rust `fn`/`pub fn`/`async fn`
/// definitions, including indented methods inside classes and modules.
#[derive(Debug, Clone)]
pub struct TestFunctionScanner {
    pattern: Regex,
}

impl TestFunctionScanner {
    pub fn new(prefix: &str) -> Self {
        let pattern = format!(
            r"(?m)^[ \t]*(?:pub(?:\([^)]*\))?[ \t]+)?(?:async[ \t]+)?(?:def|fn)[ \t]+({}\w*)[ \t]*[(<]",
            regex::escape(prefix)
        );
        Self {
            pattern: Regex::new(&pattern).expect("escaped prefix always forms a valid pattern"),
        }
    }

    pub fn scan(&self, source: &str) -> BTreeSet<String> {
        self.pattern
            .captures_iter(source)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl Default for TestFunctionScanner {
    fn default() -> Self {
        Self::new("test_")
    }
}

/// Probe over the real filesystem, resolving relative paths against the project root
#[derive(Debug, Clone)]
pub struct DiskProbe {
    root: PathBuf,
    scanner: TestFunctionScanner,
}

impl DiskProbe {
    pub fn new<P: AsRef<Path>>(root: P, scanner: TestFunctionScanner) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            scanner,
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl FilesystemProbe for DiskProbe {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn list_test_functions(&self, path: &str) -> Result<BTreeSet<String>, ProbeError> {
        let resolved = self.resolve(path);
        let content = fs::read_to_string(&resolved)
            .map_err(|source| ProbeError::UnreadableFile { path: resolved, source })?;
        Ok(self.scanner.scan(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_python_functions_and_methods() {
        let source = r#"
import pytest

def helper():
    pass

def test_login():
    assert True

async def test_async_login():
    pass

class TestLockout:
    def test_lockout_after_three_attempts(self):
        pass

    def setup_method(self):
        pass

# def test_commented_out():
"#;
        let found = TestFunctionScanner::default().scan(source);
        let expected: BTreeSet<String> = [
            "test_async_login",
            "test_lockout_after_three_attempts",
            "test_login",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(found, expected);
    }

    #[test]
    fn test_scan_rust_functions() {
        let source = r#"
#[cfg(test)]
mod tests {
    #[test]
    fn test_parse() {}

    #[tokio::test]
    async fn test_fetch() {}

    pub(crate) fn test_generic<T>() {}

    fn helper() {}
}
"#;
        let found = TestFunctionScanner::default().scan(source);
        assert_eq!(found.len(), 3);
        assert!(found.contains("test_generic"));
    }

    #[test]
    fn test_custom_prefix() {
        let found = TestFunctionScanner::new("it_").scan("def it_works():\n    pass\ndef test_x():\n");
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec!["it_works"]);
    }

    #[test]
    fn test_disk_probe_resolves_relative_to_root() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("tests")).unwrap();
        fs::write(
            temp_dir.path().join("tests/test_auth.py"),
            "def test_a():\n    pass\n",
        )
        .unwrap();

        let probe = DiskProbe::new(temp_dir.path(), TestFunctionScanner::default());

        assert!(probe.exists("tests/test_auth.py"));
        assert!(!probe.exists("tests/test_missing.py"));
        assert!(!probe.exists("tests"));
        assert_eq!(
            probe.list_test_functions("tests/test_auth.py").unwrap().len(),
            1
        );
    }

    #[test]
    fn test_disk_probe_unreadable_file() {
        let temp_dir = TempDir::new().unwrap();
        let probe = DiskProbe::new(temp_dir.path(), TestFunctionScanner::default());

        let err = probe.list_test_functions("tests/nope.py").unwrap_err();
        assert!(matches!(err, ProbeError::UnreadableFile { .. }));
    }
}
