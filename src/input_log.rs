use crate::errors::{AppError, AppResult};
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Appends `entry` as one compact JSON line. The file is created when
/// missing and never rewritten.
pub fn append_line<T: Serialize>(path: &Path, entry: &T) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|error| AppError::Io(error.to_string()))?;
    }

    let mut line = serde_json::to_string(entry)?;
    line.push('\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|error| AppError::Io(error.to_string()))?;
    // one write call per line
    file.write_all(line.as_bytes())
        .map_err(|error| AppError::Io(error.to_string()))
}
