// ============================
// credgate-lib/src/config.rs
// ============================
//! Configuration management.
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::Duration;
use config::{Config, Environment, File};
use credgate_common::HashAlgorithm;
use serde::{Deserialize, Serialize};

/// Default settings file, looked up relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "credgate.toml";

/// Environment variable prefix, e.g. `CREDGATE__POLICY__MIN_LENGTH=12`
pub const ENV_PREFIX: &str = "CREDGATE";

/// Upper bound on any configured lockout or token window (one year)
const MAX_WINDOW_SECS: u64 = 60 * 60 * 24 * 365;

/// Argon2 lane limit (2^24 - 1)
const ARGON2_MAX_LANES: u32 = 0x00FF_FFFF;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Log level used when `RUST_LOG` is not set
    pub log_level: String,
    /// Data directory for the flat-file account store
    pub data_dir: PathBuf,
    /// Storage calls taking longer than this surface as `StorageUnavailable`
    pub storage_timeout_ms: u64,
    /// Key derivation settings
    pub hasher: HasherSettings,
    /// Password and lockout policy
    pub policy: PasswordPolicy,
}

/// Key derivation function parameters
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HasherSettings {
    /// Algorithm used for new credentials
    pub algorithm: HashAlgorithm,
    /// Argon2 memory cost in KiB
    pub memory_kib: u32,
    /// Argon2 time cost
    pub iterations: u32,
    /// Argon2 lanes
    pub parallelism: u32,
    /// scrypt CPU/memory cost, as log2(N)
    pub scrypt_log_n: u8,
    /// scrypt block size
    pub scrypt_r: u32,
    /// scrypt parallelization
    pub scrypt_p: u32,
    /// Digest length in bytes
    pub output_len: usize,
    /// Salt length in bytes
    pub salt_len: usize,
}

/// Password complexity, history and lockout policy
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PasswordPolicy {
    /// Minimum password length in characters
    pub min_length: usize,
    /// Require an uppercase letter
    pub require_uppercase: bool,
    /// Require a lowercase letter
    pub require_lowercase: bool,
    /// Require a digit
    pub require_numbers: bool,
    /// Require a special character
    pub require_special_chars: bool,
    /// Number of previous passwords that may not be reused
    pub history_size: usize,
    /// Consecutive failures that lock the account
    pub max_login_attempts: u32,
    /// How long a lock lasts
    pub lockout_duration_secs: u64,
    /// How long a reset token stays valid
    pub reset_token_ttl_secs: u64,
    /// Case-insensitive substrings a password may not contain
    pub dictionary_words: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: PathBuf::from("data"),
            storage_timeout_ms: 5_000,
            hasher: HasherSettings::default(),
            policy: PasswordPolicy::default(),
        }
    }
}

impl Default for HasherSettings {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::Argon2id,
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
            scrypt_log_n: 15,
            scrypt_r: 8,
            scrypt_p: 1,
            output_len: 32,
            salt_len: 16,
        }
    }
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 10,
            require_uppercase: true,
            require_lowercase: true,
            require_numbers: true,
            require_special_chars: true,
            history_size: 3,
            max_login_attempts: 3,
            lockout_duration_secs: 15 * 60,
            reset_token_ttl_secs: 60 * 60,
            dictionary_words: ["password", "admin", "123456", "qwerty", "welcome", "test"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl PasswordPolicy {
    /// Lock length as a chrono duration
    pub fn lockout_duration(&self) -> Duration {
        Duration::seconds(self.lockout_duration_secs.min(MAX_WINDOW_SECS) as i64)
    }

    /// Reset token lifetime as a chrono duration
    pub fn reset_token_ttl(&self) -> Duration {
        Duration::seconds(self.reset_token_ttl_secs.min(MAX_WINDOW_SECS) as i64)
    }

    /// Check the policy is usable
    pub fn validate(&self) -> Result<()> {
        if self.min_length < 6 {
            bail!("policy.min_length must be at least 6");
        }
        if self.max_login_attempts == 0 {
            bail!("policy.max_login_attempts must be at least 1");
        }
        if self.lockout_duration_secs == 0 || self.lockout_duration_secs > MAX_WINDOW_SECS {
            bail!("policy.lockout_duration_secs must be between 1 and {MAX_WINDOW_SECS}");
        }
        if self.reset_token_ttl_secs == 0 || self.reset_token_ttl_secs > MAX_WINDOW_SECS {
            bail!("policy.reset_token_ttl_secs must be between 1 and {MAX_WINDOW_SECS}");
        }
        if self.dictionary_words.iter().any(|w| w.trim().is_empty()) {
            bail!("policy.dictionary_words must not contain empty entries");
        }
        Ok(())
    }
}

impl HasherSettings {
    /// Check the parameters are accepted by the configured KDF
    pub fn validate(&self) -> Result<()> {
        if self.output_len < 16 {
            bail!("hasher.output_len must be at least 16 bytes");
        }
        if self.salt_len < 16 {
            bail!("hasher.salt_len must be at least 16 bytes");
        }
        if self.iterations == 0 || self.parallelism == 0 {
            bail!("hasher.iterations and hasher.parallelism must be at least 1");
        }
        if self.parallelism > ARGON2_MAX_LANES {
            bail!("hasher.parallelism must be at most {ARGON2_MAX_LANES}");
        }
        match self.parallelism.checked_mul(8) {
            Some(min_memory) if self.memory_kib >= min_memory => {}
            _ => bail!("hasher.memory_kib must be at least 8 * parallelism"),
        }
        if self.scrypt_log_n == 0 || self.scrypt_log_n >= 64 || self.scrypt_r == 0 || self.scrypt_p == 0 {
            bail!("hasher scrypt parameters out of range");
        }
        Ok(())
    }
}

impl Settings {
    /// Load settings from `credgate.toml` (if present) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load settings from a specific file (if present) and the environment.
    /// Environment variables take precedence over the file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("policy.dictionary_words")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            bail!("log_level must be one of {LOG_LEVELS:?}");
        }
        if self.storage_timeout_ms == 0 {
            bail!("storage_timeout_ms must be greater than zero");
        }
        self.hasher.validate()?;
        self.policy.validate()?;
        Ok(())
    }

    /// Storage timeout as a std duration
    pub fn storage_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.storage_timeout_ms)
    }
}
