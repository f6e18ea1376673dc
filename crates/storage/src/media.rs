//! Photo files on disk, laid out under the media root.
//!
//! Layout: `photos/listing_<key>/<name>` where the key is the listing's ad
//! number when known, otherwise its row id. The database stores paths
//! relative to the media root, so the root can move without rewriting rows.

use std::path::{Path, PathBuf};

use coralingest_shared::{CoralIngestError, Result};

/// Owns the photo file tree under one media root.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory key for a listing: ad number when known, row id otherwise.
    pub fn listing_key(external_id: Option<&str>, listing_id: i64) -> String {
        match external_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => listing_id.to_string(),
        }
    }

    /// Relative storage path for one photo. The file name is sanitized and
    /// forced to carry an extension, `.jpg` when it has none.
    pub fn relative_path(key: &str, file_name: &str) -> String {
        let sanitized: String = file_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        let named = if Path::new(&sanitized).extension().is_some() {
            sanitized
        } else {
            format!("{sanitized}.jpg")
        };

        format!("photos/listing_{key}/{named}")
    }

    /// Absolute path of a stored photo.
    pub fn absolute(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write photo bytes, creating parent directories as needed.
    pub fn save(&self, relative: &str, bytes: &[u8]) -> Result<()> {
        let path = self.absolute(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CoralIngestError::io(parent, e))?;
        }
        std::fs::write(&path, bytes).map_err(|e| CoralIngestError::io(&path, e))
    }

    /// Whether the stored photo actually holds bytes on disk.
    ///
    /// A zero-length file counts as broken; a row pointing at one must be
    /// repaired the same as a missing file.
    pub fn exists(&self, relative: &str) -> bool {
        std::fs::metadata(self.absolute(relative))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    /// Remove a stored photo; a file already gone is not an error.
    pub fn remove(&self, relative: &str) -> Result<()> {
        let path = self.absolute(relative);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoralIngestError::io(&path, e)),
        }
    }
}
