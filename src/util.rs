//! Shared utility functions for the appforge crate.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Normalize a spec name into a storage identifier: lower-cased, spaces become underscores.
pub fn normalize_identifier(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Hex-encoded SHA-256 of a file, streamed from disk.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Serialize `value` as pretty JSON (trailing newline) and write it to `path`.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let mut json = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    json.push('\n');
    std::fs::write(path, json)
}

/// Keep the last `max` bytes of `text`, cut on a char boundary.
pub fn tail(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
