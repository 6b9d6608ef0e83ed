// ============================
// crates/credgate-lib/src/validation/mod.rs
// ============================
//! Password policy and registration input validation.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use crate::config::PasswordPolicy;
use crate::error::AuthError;

/// Hard ceiling on password length, independent of policy. Keeps KDF input bounded.
pub const MAX_PASSWORD_LENGTH: usize = 128;
const MAX_USERNAME_LENGTH: usize = 64;
const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid username regex"));
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
});

/// A single password rule that a candidate failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    #[error("Password must be at least {min_length} characters long")]
    TooShort { min_length: usize },

    #[error("Password must be at most {max_length} characters long")]
    TooLong { max_length: usize },

    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,

    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,

    #[error("Password must contain at least one number")]
    MissingDigit,

    #[error("Password must contain at least one special character")]
    MissingSpecialChar,

    #[error("Password contains a common word that is not allowed")]
    DictionaryWord,

    #[error("Password was used recently, choose one not among the last {history_size}")]
    RecentlyUsed { history_size: usize },
}

/// Pass/fail per rule, in the shape a signup form renders next to the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirements {
    pub length: bool,
    pub uppercase: bool,
    pub lowercase: bool,
    pub numbers: bool,
    pub special_chars: bool,
    pub dictionary: bool,
}

/// Outcome of checking a password against a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordCheck {
    /// Every rule that failed, in a stable order
    pub violations: Vec<Violation>,
    /// Per-rule result; disabled rules report `true`
    pub requirements: Requirements,
}

impl PasswordCheck {
    /// True when no rule failed
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Convert into a `PasswordRejected` error when any rule failed
    pub fn into_result(self) -> Result<(), AuthError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(AuthError::PasswordRejected(self.violations))
        }
    }
}

fn is_special(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace()
}

/// Check a password against every rule of the policy. Does not short-circuit:
/// all failing rules are reported.
pub fn validate_password(password: &str, policy: &PasswordPolicy) -> PasswordCheck {
    let length = password.chars().count();
    let lowered = password.to_lowercase();

    let requirements = Requirements {
        length: length >= policy.min_length && length <= MAX_PASSWORD_LENGTH,
        uppercase: !policy.require_uppercase || password.chars().any(char::is_uppercase),
        lowercase: !policy.require_lowercase || password.chars().any(char::is_lowercase),
        numbers: !policy.require_numbers || password.chars().any(|c| c.is_ascii_digit()),
        special_chars: !policy.require_special_chars || password.chars().any(is_special),
        dictionary: !policy
            .dictionary_words
            .iter()
            .any(|word| lowered.contains(&word.to_lowercase())),
    };

    let mut violations = Vec::new();
    if length < policy.min_length {
        violations.push(Violation::TooShort { min_length: policy.min_length });
    }
    if length > MAX_PASSWORD_LENGTH {
        violations.push(Violation::TooLong { max_length: MAX_PASSWORD_LENGTH });
    }
    if !requirements.uppercase {
        violations.push(Violation::MissingUppercase);
    }
    if !requirements.lowercase {
        violations.push(Violation::MissingLowercase);
    }
    if !requirements.numbers {
        violations.push(Violation::MissingDigit);
    }
    if !requirements.special_chars {
        violations.push(Violation::MissingSpecialChar);
    }
    if !requirements.dictionary {
        violations.push(Violation::DictionaryWord);
    }

    PasswordCheck { violations, requirements }
}

/// Possible input validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),
}

impl From<ValidationError> for AuthError {
    fn from(err: ValidationError) -> Self {
        AuthError::InvalidInput(err.to_string())
    }
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trim and validate a username
pub fn validate_username(username: &str) -> ValidationResult<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(ValidationError::InvalidUsername(
            "Username must not be empty".to_string(),
        ));
    }

    if username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::InvalidUsername(format!(
            "Username must be at most {MAX_USERNAME_LENGTH} characters"
        )));
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError::InvalidUsername(
            "Username may only contain letters, digits, '.', '_' and '-'".to_string(),
        ));
    }

    Ok(username)
}

/// Trim and validate an email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::InvalidEmail(
            "Email must not be empty".to_string(),
        ));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email must be at most {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Email format is invalid".to_string(),
        ));
    }

    Ok(email)
}
