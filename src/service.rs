use crate::access::AccessCodeSet;
use crate::attachments;
use crate::config::AppSettings;
use crate::errors::{AppError, AppResult};
use crate::input_log;
use crate::locks::FileLocks;
use crate::mailbox;
use crate::models::{
    iso_timestamp, InputLogEntry, LeaveMessagePayload, LogInputPayload, MessageRecord, PromptAuthPayload,
};
use chrono::Utc;

pub const WRONG_CODE_MESSAGE: &str = "Wrong access code, please try again.";
pub const MISSING_FIELDS_MESSAGE: &str = "Please fill in both a nickname and a message.";

/// Request-independent core behind the HTTP routes. Holds only the
/// read-only settings and access set plus the per-file write locks.
pub struct IntakeService {
    settings: AppSettings,
    access: AccessCodeSet,
    locks: FileLocks,
}

impl IntakeService {
    pub fn new(settings: AppSettings) -> Self {
        let access = AccessCodeSet::from_settings(&settings);
        if access.is_empty() {
            tracing::warn!("no access codes configured; every code will be rejected");
        }
        Self {
            settings,
            access,
            locks: FileLocks::new(),
        }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn check_code(&self, payload: &PromptAuthPayload) -> bool {
        let authorized = self.access.authorize(payload.code.as_deref().unwrap_or_default());
        tracing::debug!(authorized, "access code checked");
        authorized
    }

    pub async fn leave_message(&self, payload: LeaveMessagePayload) -> AppResult<MessageRecord> {
        let code = trimmed(payload.code.as_deref());
        if !self.access.authorize(code) {
            tracing::info!("leave-message rejected: wrong access code");
            return Err(AppError::Unauthorized(WRONG_CODE_MESSAGE.to_string()));
        }

        let nickname = trimmed(payload.nickname.as_deref());
        let content = trimmed(payload.content.as_deref());
        if nickname.is_empty() || content.is_empty() {
            return Err(AppError::Validation(MISSING_FIELDS_MESSAGE.to_string()));
        }

        let record = MessageRecord::new(nickname, content, Utc::now());
        let path = self.settings.message_path();

        // held by the blocking task until the write finishes, even if the
        // request is dropped
        let guard = self.locks.acquire(&path).await;
        let to_store = record.clone();
        let count = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            mailbox::append_record(&path, &to_store)
        })
        .await??;

        tracing::info!(count, "message saved to mailbox");
        Ok(record)
    }

    pub async fn log_input(&self, payload: LogInputPayload, client_ip: Option<String>) -> AppResult<InputLogEntry> {
        let timestamp = iso_timestamp(Utc::now());
        let raw_input = trimmed(payload.raw_input.as_deref()).to_string();
        let response = payload.response.as_deref().map(|value| value.trim().to_string());
        let images = payload.images.unwrap_or_default();

        let log_path = self.settings.input_log_path();
        let attachments_dir = self.settings.attachments_path();

        let guard = self.locks.acquire(&log_path).await;
        let entry = tokio::task::spawn_blocking(move || -> AppResult<InputLogEntry> {
            let _guard = guard;
            let saved = match attachments::save_attachments(&attachments_dir, &timestamp, &images) {
                Ok(saved) => saved,
                Err(error) => {
                    tracing::warn!(error = %error, "attachments unavailable; logging input without them");
                    Vec::new()
                }
            };
            if saved.len() < images.len() {
                tracing::warn!(
                    submitted = images.len(),
                    saved = saved.len(),
                    "some attachments were dropped"
                );
            }
            let entry = InputLogEntry {
                timestamp,
                raw_input,
                response,
                client_ip,
                images: saved,
            };
            if let Err(error) = input_log::append_line(&log_path, &entry) {
                attachments::remove_attachments(&attachments_dir, &entry.images);
                return Err(error);
            }
            Ok(entry)
        })
        .await??;

        tracing::info!(images = entry.images.len(), "user input logged");
        Ok(entry)
    }
}

fn trimmed(value: Option<&str>) -> &str {
    value.map(str::trim).unwrap_or_default()
}
