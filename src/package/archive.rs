//! Deterministic `source.zip` of the generated client tree.
//!
//! Entries are sorted by relative path and carry a fixed timestamp
//! (1980-01-01 00:00:00), fixed permissions and maximum Deflate compression,
//! so the same tree always yields byte-identical archives. Platform and build
//! output directories and signing/binary files are left out.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::errors::PackagingError;

pub const SOURCE_ARCHIVE: &str = "source.zip";

const EXCLUDED_DIRS: [&str; 4] = ["android", "build", ".dart_tool", ".gradle"];
const EXCLUDED_EXTENSIONS: [&str; 3] = ["apk", "aab", "keystore"];

fn is_excluded_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| EXCLUDED_DIRS.iter().any(|d| d.eq_ignore_ascii_case(name)))
            .unwrap_or(false)
}

fn is_excluded_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| EXCLUDED_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Files to archive as `(relative path with '/' separators, absolute path)`, sorted.
pub fn collect_source_files(root: &Path) -> Result<Vec<(String, PathBuf)>, PackagingError> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e))
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            PackagingError::io(path, std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() || is_excluded_file(entry.path()) {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((name, entry.path().to_path_buf()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

/// Write the archive of `root` to `zip_path`. A missing `root` yields an empty archive.
/// Returns the number of entries.
pub fn write_source_zip(root: &Path, zip_path: &Path) -> Result<usize, PackagingError> {
    let files = collect_source_files(root)?;

    let file = File::create(zip_path).map_err(|e| PackagingError::io(zip_path, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .last_modified_time(zip::DateTime::default())
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(9))
        .unix_permissions(0o644);

    let archive_err = |source| PackagingError::Archive {
        path: zip_path.to_path_buf(),
        source,
    };

    for (name, path) in &files {
        zip.start_file(name.as_str(), options).map_err(archive_err)?;
        let mut input = File::open(path).map_err(|e| PackagingError::io(path, e))?;
        std::io::copy(&mut input, &mut zip).map_err(|e| PackagingError::io(path, e))?;
    }

    let mut writer = zip.finish().map_err(archive_err)?;
    writer.flush().map_err(|e| PackagingError::io(zip_path, e))?;
    Ok(files.len())
}
