// src/files.rs

//! Scan output directory.
//!
//! The scan scripts write their results into one flat directory; the web
//! client lists, downloads and deletes them by bare file name.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::errors::{Result, ScantestError};
use crate::fs::{FileReader, FileSystem};

#[derive(Debug, Clone)]
pub struct ScanStore {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
}

impl ScanStore {
    /// Open the store, creating the directory if it does not exist yet.
    pub fn open(fs: Arc<dyn FileSystem>, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !fs.exists(&dir) {
            info!(dir = ?dir, "creating scan output directory");
            fs.create_dir_all(&dir)?;
        }
        Ok(Self { fs, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File names in the directory, most recently modified first.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut entries: Vec<(SystemTime, String)> = Vec::new();

        for path in self.fs.read_dir(&self.dir)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                warn!(path = ?path, "skipping non UTF-8 file name");
                continue;
            };
            let modified = self.fs.modified(&path)?;
            entries.push((modified, name.to_string()));
        }

        entries.sort_by(|a, b| Reverse(a.0).cmp(&Reverse(b.0)).then_with(|| a.1.cmp(&b.1)));
        Ok(entries.into_iter().map(|(_, name)| name).collect())
    }

    pub fn contains(&self, name: &str) -> bool {
        match self.entry_path(name) {
            Ok(path) => self.fs.is_file(&path),
            Err(_) => false,
        }
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.entry_path(name)?;
        info!(file = name, "deleting scan file");
        self.fs.remove_file(&path)?;
        Ok(())
    }

    pub fn open_file(&self, name: &str) -> Result<FileReader> {
        let path = self.entry_path(name)?;
        debug!(file = name, "opening scan file for download");
        Ok(self.fs.open_read(&path)?)
    }

    /// Only bare file names are accepted; anything that could address a
    /// path outside the directory is rejected.
    pub fn check_name(name: &str) -> Result<()> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        if valid {
            Ok(())
        } else {
            Err(ScantestError::InvalidFileName(name.to_string()))
        }
    }

    fn entry_path(&self, name: &str) -> Result<PathBuf> {
        Self::check_name(name)?;
        Ok(self.dir.join(name))
    }
}
