//! [`TestWorkspace`] builder for on-disk scenarios.

use crate::trees::SAMPLE_SCHEMA_TOML;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary project directory holding a schema, fragments and a
/// `converge.toml`.
///
/// ```rust,no_run
/// use converge_test_utils::TestWorkspace;
///
/// let ws = TestWorkspace::new().with_sample_schema();
/// ws.write("host.toml", "pkg = [\"git\"]\n");
/// assert!(ws.path("host.toml").exists());
/// ```
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("TestWorkspace::new: failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of `relative` inside the workspace.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root().join(relative)
    }

    /// Write `content` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Write the sample schema to `schema.toml` and a `converge.toml`
    /// pointing at it.
    pub fn with_sample_schema(self) -> Self {
        self.write("schema.toml", SAMPLE_SCHEMA_TOML);
        self.write("converge.toml", "schema = \"schema.toml\"\n");
        self
    }

    /// Directory of the snapshot store with default settings.
    pub fn state_dir(&self) -> PathBuf {
        self.path(".converge")
    }

    /// Paths of stored generation files, sorted.
    pub fn generation_files(&self) -> Vec<PathBuf> {
        let dir = self.state_dir().join("generations");
        let mut files: Vec<PathBuf> = match fs::read_dir(&dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        };
        files.sort();
        files
    }
}
