//! `checksums.txt`: SHA-256 of every file in the artifact bundle.

use std::collections::BTreeMap;
use std::path::Path;

use walkdir::WalkDir;

use crate::errors::PackagingError;
use crate::util::sha256_file;

pub const MANIFEST_FILE: &str = "checksums.txt";

/// Relative path (with `/` separators) to hex digest, sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumManifest {
    entries: BTreeMap<String, String>,
}

impl ChecksumManifest {
    /// Hash every regular file under `dir` except the manifest itself.
    pub fn compute(dir: &Path) -> Result<Self, PackagingError> {
        let mut entries = BTreeMap::new();
        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                PackagingError::io(path, std::io::Error::other(e.to_string()))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(dir) else {
                continue;
            };
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key == MANIFEST_FILE {
                continue;
            }
            let digest = sha256_file(entry.path()).map_err(|e| PackagingError::io(entry.path(), e))?;
            entries.insert(key, digest);
        }
        Ok(Self { entries })
    }

    /// Compute and write `checksums.txt` into `dir`.
    pub fn write(dir: &Path) -> Result<Self, PackagingError> {
        let manifest = Self::compute(dir)?;
        let path = dir.join(MANIFEST_FILE);
        std::fs::write(&path, manifest.render()).map_err(|e| PackagingError::io(&path, e))?;
        Ok(manifest)
    }

    /// `<hex>  <path>` lines, the format `sha256sum -c` accepts.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(path, digest)| format!("{}  {}\n", digest, path))
            .collect()
    }

    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| line.split_once("  "))
            .map(|(digest, path)| (path.to_string(), digest.to_string()))
            .collect();
        Self { entries }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
