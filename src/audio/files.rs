//! Local storage for synthesized replies
//!
//! Files are never removed by the application.

use crate::{DeskpalError, Result};
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Writes audio payloads under timestamped, never-reused file names
#[derive(Debug, Clone)]
pub struct AudioFileStore {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl AudioFileStore {
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: "output".to_string(),
            extension: extension.into(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist `bytes` as a new file and return its path
    ///
    /// The name is `<prefix>_<YYYYmmdd_HHMMSS_micros>.<ext>`; if that file
    /// already exists a numeric suffix is added instead of overwriting it.
    pub fn write(&self, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S_%6f").to_string();
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{}_{}.{}", self.prefix, stamp, self.extension)
            } else {
                format!("{}_{}_{}.{}", self.prefix, stamp, attempt, self.extension)
            };
            let path = self.dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(bytes)?;
                    debug!("Wrote {} bytes to {}", bytes.len(), path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(DeskpalError::IOError(format!(
            "No free file name for {} in {}",
            stamp,
            self.dir.display()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_write_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AudioFileStore::new(tmp.path().join("speech"), "wav");

        let path = store.write(b"RIFF....").unwrap();
        assert!(path.starts_with(tmp.path().join("speech")));
        assert_eq!(path.extension().unwrap(), "wav");
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("output_"));
        assert_eq!(fs::read(&path).unwrap(), b"RIFF....");
    }

    #[test]
    fn test_names_never_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let store = AudioFileStore::new(tmp.path(), "wav").with_prefix("reply");

        let paths: HashSet<PathBuf> = (0..50).map(|i| store.write(&[i as u8]).unwrap()).collect();
        assert_eq!(paths.len(), 50);
        for path in &paths {
            assert_eq!(fs::read(path).unwrap().len(), 1);
        }
    }
}
