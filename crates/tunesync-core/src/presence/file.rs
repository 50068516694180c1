use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::presence::PresenceSink;

/// Writes the status to a text file, e.g. for a streaming overlay.
///
/// Clearing leaves an empty file rather than removing it so overlays keep their source.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, content: &str) -> Result<()> {
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl PresenceSink for FileSink {
    fn set_status(&mut self, name: &str) -> Result<()> {
        self.write_file(name)
    }

    fn clear_status(&mut self) -> Result<()> {
        self.write_file("")
    }
}
