//! Run identifiers.
//!
//! Every run owns the directory `<work_dir>/<run_id>/`. Ids are either
//! generated (UUIDv4) or supplied by the caller, in which case they must be a
//! single safe path component.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::errors::SpecError;

static RUN_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn generate() -> Self {
        RunId(uuid::Uuid::new_v4().to_string())
    }

    /// Accept a caller-supplied id matching `[A-Za-z0-9][A-Za-z0-9_.-]*`.
    pub fn parse(raw: &str) -> Result<Self, SpecError> {
        if RUN_ID_REGEX.is_match(raw) {
            Ok(RunId(raw.to_string()))
        } else {
            Err(SpecError::RunIdInvalid(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory for this run under `work_dir`.
    pub fn dir(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(&self.0)
    }

    /// Create the run directory, failing if it already exists; ids are never reused.
    ///
    /// The directory itself is created with a single `create_dir`, so of two
    /// runs racing for the same id exactly one wins.
    pub fn claim(&self, work_dir: &Path) -> Result<PathBuf, SpecError> {
        std::fs::create_dir_all(work_dir).map_err(|source| SpecError::RunDir {
            path: work_dir.to_path_buf(),
            source,
        })?;
        let dir = self.dir(work_dir);
        match std::fs::create_dir(&dir) {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(SpecError::RunIdInUse(self.0.clone()))
            }
            Err(source) => Err(SpecError::RunDir { path: dir, source }),
        }
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
