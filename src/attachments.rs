use crate::errors::{AppError, AppResult};
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

static DATA_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:(?:([\w.+-]+)/([\w.+-]+))?(?:;[^,;]+)*?;base64,(.*)$").expect("valid regex")
});

const DEFAULT_EXTENSION: &str = "png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    pub subtype: Option<String>,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    pub fn extension(&self) -> &'static str {
        extension_for(self.subtype.as_deref())
    }
}

/// `None` for anything that is not a base64 data URL with a non-empty,
/// decodable payload.
pub fn parse_data_url(input: &str) -> Option<DataUrl> {
    let caps = DATA_URL_PATTERN.captures(input.trim())?;
    let payload: String = caps
        .get(3)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if payload.is_empty() {
        return None;
    }
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload).ok()?;
    if bytes.is_empty() {
        return None;
    }

    let subtype = caps.get(2).map(|m| m.as_str().to_ascii_lowercase());
    Some(DataUrl { subtype, bytes })
}

pub fn extension_for(subtype: Option<&str>) -> &'static str {
    match subtype.map(str::to_ascii_lowercase).as_deref() {
        Some("jpeg") | Some("jpg") | Some("pjpeg") => "jpg",
        Some("png") => "png",
        Some("gif") => "gif",
        Some("webp") => "webp",
        Some("bmp") => "bmp",
        Some("avif") => "avif",
        Some("tiff") => "tiff",
        Some("x-icon") | Some("vnd.microsoft.icon") => "ico",
        Some("svg+xml") => "svg",
        _ => DEFAULT_EXTENSION,
    }
}

/// `2024-05-01T08:30:00.123Z` becomes `2024-05-01T08-30-00-123Z`.
pub fn sanitize_timestamp(timestamp: &str) -> String {
    timestamp
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '-'
            }
        })
        .collect()
}

/// Writes every decodable data URL under `dir` and returns the written file
/// names in input order. Malformed entries, name collisions and failed
/// writes are skipped; existing files are never overwritten.
pub fn save_attachments(dir: &Path, timestamp: &str, data_urls: &[String]) -> AppResult<Vec<String>> {
    if data_urls.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(dir).map_err(|error| AppError::Io(error.to_string()))?;

    let prefix = sanitize_timestamp(timestamp);
    let mut written = Vec::new();
    for (index, raw) in data_urls.iter().enumerate() {
        let Some(data_url) = parse_data_url(raw) else {
            tracing::warn!(index, "skipping malformed data url attachment");
            continue;
        };

        let file_name = format!("{}-{}.{}", prefix, index, data_url.extension());
        match write_new(&dir.join(&file_name), &data_url.bytes) {
            Ok(()) => written.push(file_name),
            Err(error) if error.kind() == ErrorKind::AlreadyExists => {
                tracing::warn!(file = %file_name, "attachment name already taken; skipping");
            }
            Err(error) => {
                tracing::warn!(file = %file_name, error = %error, "failed to write attachment");
            }
        }
    }

    Ok(written)
}

/// Best-effort cleanup for attachments whose log entry was never written.
pub fn remove_attachments(dir: &Path, file_names: &[String]) {
    for file_name in file_names {
        if let Err(error) = fs::remove_file(dir.join(file_name)) {
            tracing::warn!(file = %file_name, error = %error, "failed to remove orphaned attachment");
        }
    }
}

fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)
}
