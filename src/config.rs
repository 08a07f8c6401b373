use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "CHAT_INTAKE_CONFIG";
pub const BIND_ENV: &str = "CHAT_INTAKE_BIND";
pub const DATA_DIR_ENV: &str = "CHAT_INTAKE_DATA_DIR";
pub const MAX_BODY_BYTES_ENV: &str = "CHAT_INTAKE_MAX_BODY_BYTES";
pub const ACCESS_CODES_ENV: &str = "CODE";

const MIN_BODY_BYTES: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppSettings {
    pub bind_address: String,
    pub data_dir: PathBuf,
    pub message_file: String,
    pub input_log_file: String,
    pub attachments_dir: String,
    pub log_dir: Option<PathBuf>,
    pub max_body_bytes: usize,
    /// Plaintext codes, hashed when the access set is built.
    pub access_codes: Vec<String>,
    /// Lowercase hex MD5 digests.
    pub access_code_hashes: Vec<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            data_dir: PathBuf::from("data"),
            message_file: "leon-messages.json".to_string(),
            input_log_file: "raw_user_inputs.log".to_string(),
            attachments_dir: "raw_user_inputs_images".to_string(),
            log_dir: None,
            max_body_bytes: 16 * 1024 * 1024,
            access_codes: Vec::new(),
            access_code_hashes: Vec::new(),
        }
    }
}

impl AppSettings {
    /// Defaults, then the YAML file named by `CHAT_INTAKE_CONFIG`, then
    /// environment overrides.
    pub fn load() -> AppResult<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    pub fn load_with<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = match lookup(CONFIG_PATH_ENV).filter(|value| !value.trim().is_empty()) {
            Some(path) => Self::from_yaml_file(Path::new(path.trim()))?,
            None => Self::default(),
        };
        settings.apply_overrides(lookup);
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_yaml_file(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path).map_err(|error| {
            AppError::Io(format!("Failed to read config {}: {}", path.to_string_lossy(), error))
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).map_err(AppError::from)
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup(BIND_ENV).filter(|v| !v.trim().is_empty()) {
            self.bind_address = bind.trim().to_string();
        }
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir.trim());
        }
        match lookup(MAX_BODY_BYTES_ENV).map(|v| v.trim().parse::<usize>()) {
            Some(Ok(bytes)) => self.max_body_bytes = bytes,
            Some(Err(error)) => {
                tracing::warn!(error = %error, "ignoring unparsable {}", MAX_BODY_BYTES_ENV);
            }
            None => {}
        }
        if let Some(codes) = lookup(ACCESS_CODES_ENV) {
            self.access_codes.extend(
                codes
                    .split(',')
                    .map(str::trim)
                    .filter(|code| !code.is_empty())
                    .map(ToString::to_string),
            );
        }
    }

    fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("messageFile", &self.message_file),
            ("inputLogFile", &self.input_log_file),
            ("attachmentsDir", &self.attachments_dir),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{} cannot be empty", name)));
            }
        }
        if self.max_body_bytes < MIN_BODY_BYTES {
            return Err(AppError::Validation(format!(
                "maxBodyBytes must be at least {}",
                MIN_BODY_BYTES
            )));
        }
        Ok(())
    }

    pub fn message_path(&self) -> PathBuf {
        self.data_dir.join(&self.message_file)
    }

    pub fn input_log_path(&self) -> PathBuf {
        self.data_dir.join(&self.input_log_file)
    }

    pub fn attachments_path(&self) -> PathBuf {
        self.data_dir.join(&self.attachments_dir)
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("logs"))
    }
}
