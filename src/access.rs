use crate::config::AppSettings;
use md5::{Digest, Md5};
use std::collections::HashSet;

/// Lowercase hex MD5 of the trimmed code. Only used for fixed-length
/// comparison against the configured set, not for secrecy.
pub fn hash_code(code: &str) -> String {
    hex::encode(Md5::digest(code.trim().as_bytes()))
}

/// Accepted access-code digests, built once at start-up.
#[derive(Debug, Clone, Default)]
pub struct AccessCodeSet {
    hashes: HashSet<String>,
}

impl AccessCodeSet {
    pub fn new<I, S>(hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hashes = hashes
            .into_iter()
            .map(|hash| hash.as_ref().trim().to_ascii_lowercase())
            .filter(|hash| !hash.is_empty())
            .collect();
        Self { hashes }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        let hashed_plaintext = settings
            .access_codes
            .iter()
            .map(|code| code.trim())
            .filter(|code| !code.is_empty())
            .map(hash_code);
        let mut set = Self::new(&settings.access_code_hashes);
        set.hashes.extend(hashed_plaintext);
        set
    }

    pub fn authorize(&self, submitted: &str) -> bool {
        self.hashes.contains(&hash_code(submitted))
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}
