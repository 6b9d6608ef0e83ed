use credgate_lib::auth::AuthService;
use credgate_lib::config::PasswordPolicy;
use credgate_lib::error::AuthError;
use credgate_lib::validation::{validate_password, Violation};

use crate::test_utils::{memory_env, STRONG_PASSWORD};

#[test]
fn test_every_violation_is_reported() {
    let check = validate_password("hello", &PasswordPolicy::default());

    assert!(!check.is_valid());
    assert_eq!(
        check.violations,
        vec![
            Violation::TooShort { min_length: 10 },
            Violation::MissingUppercase,
            Violation::MissingDigit,
            Violation::MissingSpecialChar,
        ]
    );
    assert!(check.requirements.lowercase);
    assert!(!check.requirements.length);
}

#[test]
fn test_dictionary_match_ignores_case() {
    let check = validate_password("MyPaSSword!99", &PasswordPolicy::default());
    assert_eq!(check.violations, vec![Violation::DictionaryWord]);
    assert!(!check.requirements.dictionary);
}

#[test]
fn test_disabled_rules_pass() {
    let policy = PasswordPolicy {
        min_length: 4,
        require_uppercase: false,
        require_numbers: false,
        require_special_chars: false,
        dictionary_words: Vec::new(),
        ..PasswordPolicy::default()
    };
    let check = validate_password("plain password", &policy);
    assert!(check.is_valid(), "{:?}", check.violations);
    assert!(check.requirements.uppercase && check.requirements.special_chars);
}

#[tokio::test]
async fn test_policy_change_applies_to_next_call() {
    let env = memory_env();
    assert!(env.auth.check_password(STRONG_PASSWORD).is_valid());

    env.policy
        .update(PasswordPolicy {
            min_length: 16,
            ..PasswordPolicy::default()
        })
        .unwrap();

    let check = env.auth.check_password(STRONG_PASSWORD);
    assert_eq!(check.violations, vec![Violation::TooShort { min_length: 16 }]);

    let err = env
        .auth
        .register("alice", "a@x.com", STRONG_PASSWORD)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PasswordRejected(v) if v.len() == 1));
}

#[test]
fn test_invalid_policy_update_is_refused() {
    let env = memory_env();
    let err = env
        .policy
        .update(PasswordPolicy {
            max_login_attempts: 0,
            ..PasswordPolicy::default()
        })
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidInput(_)));
    assert!(env.auth.check_password(STRONG_PASSWORD).is_valid());
}
