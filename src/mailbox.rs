//! JSON-array mailbox: the whole file is one ordered array of records that
//! only ever grows.

use crate::errors::{AppError, AppResult};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Appends `record` to the array stored at `path` and returns the new
/// record count. Callers must serialize concurrent appends to one path.
pub fn append_record<T: Serialize>(path: &Path, record: &T) -> AppResult<usize> {
    let parent = ensure_parent(path)?;

    let mut records = load_existing(path);
    records.push(serde_json::to_value(record)?);
    let count = records.len();

    let bytes = serde_json::to_vec_pretty(&Value::Array(records))?;
    write_replacing(parent, path, &bytes)?;
    Ok(count)
}

/// Start fresh on a missing, unreadable or malformed store. Only a JSON
/// array counts as existing content.
pub fn load_existing(path: &Path) -> Vec<Value> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(error) => {
            tracing::warn!(path = %path.to_string_lossy(), error = %error, "mailbox unreadable; starting fresh");
            return Vec::new();
        }
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Array(records)) => records,
        Ok(_) => {
            tracing::warn!(path = %path.to_string_lossy(), "mailbox is not a JSON array; starting fresh");
            Vec::new()
        }
        Err(error) => {
            tracing::warn!(path = %path.to_string_lossy(), error = %error, "malformed mailbox; starting fresh");
            Vec::new()
        }
    }
}

fn ensure_parent(path: &Path) -> AppResult<&Path> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|error| AppError::Io(error.to_string()))?;
    Ok(parent)
}

/// Temp file in the target directory renamed over the target; readers only
/// ever see a complete array.
fn write_replacing(dir: &Path, path: &Path, bytes: &[u8]) -> AppResult<()> {
    let mut temp = NamedTempFile::new_in(dir).map_err(|error| AppError::Io(error.to_string()))?;
    temp.write_all(bytes)
        .map_err(|error| AppError::Io(error.to_string()))?;
    temp.as_file()
        .sync_all()
        .map_err(|error| AppError::Io(error.to_string()))?;
    temp.persist(path)
        .map_err(|error| AppError::Io(error.error.to_string()))?;
    Ok(())
}
