//! Unit file output.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{BuildError, BuildResult};

/// What happened to one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was created or its content replaced.
    Written,
    /// The file already held the same bytes and was left alone.
    Unchanged,
}

impl WriteOutcome {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Written => "written",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Writes files into the output directory.
///
/// Content goes to a temporary sibling first and is renamed into place, so a
/// reader never sees a partially written unit.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    dir: PathBuf,
    incremental: bool,
}

impl OutputWriter {
    /// Creates a writer for `dir`; with `incremental`, identical files are
    /// not rewritten.
    pub fn new(dir: impl Into<PathBuf>, incremental: bool) -> Self {
        Self {
            dir: dir.into(),
            incremental,
        }
    }

    /// The output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the output directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Io`] if the directory cannot be created.
    pub fn prepare(&self) -> BuildResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| BuildError::io(&self.dir, e))
    }

    /// Writes `bytes` to `file` inside the output directory.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Io`] on write failure.
    pub fn write(&self, file: &str, bytes: &[u8]) -> BuildResult<WriteOutcome> {
        let path = self.dir.join(file);
        if self.incremental && fs::read(&path).is_ok_and(|existing| existing == bytes) {
            debug!(path = %path.display(), "unchanged");
            return Ok(WriteOutcome::Unchanged);
        }

        let tmp = self.dir.join(format!(".{file}.tmp"));
        fs::write(&tmp, bytes).map_err(|e| BuildError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| BuildError::io(&path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "written");
        Ok(WriteOutcome::Written)
    }

    /// Removes `file` from the output directory. Returns `false` if it was
    /// already gone.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Io`] if an existing file cannot be removed.
    pub fn remove(&self, file: &str) -> BuildResult<bool> {
        let path = self.dir.join(file);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BuildError::io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_incremental_write_skips_identical_bytes() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path(), true);
        assert_eq!(writer.write("a.dunit", b"one").unwrap(), WriteOutcome::Written);
        assert_eq!(writer.write("a.dunit", b"one").unwrap(), WriteOutcome::Unchanged);
        assert_eq!(writer.write("a.dunit", b"two").unwrap(), WriteOutcome::Written);
        assert_eq!(fs::read(dir.path().join("a.dunit")).unwrap(), b"two");
        assert!(!dir.path().join(".a.dunit.tmp").exists());
    }

    #[test]
    fn test_non_incremental_always_writes() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path(), false);
        writer.write("a.dunit", b"one").unwrap();
        assert_eq!(writer.write("a.dunit", b"one").unwrap(), WriteOutcome::Written);
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path(), true);
        writer.write("a.dunit", b"x").unwrap();
        assert!(writer.remove("a.dunit").unwrap());
        assert!(!writer.remove("a.dunit").unwrap());
    }

    #[test]
    fn test_prepare_creates_nested_dir() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path().join("gen/units"), true);
        writer.prepare().unwrap();
        assert!(writer.dir().is_dir());
    }
}
