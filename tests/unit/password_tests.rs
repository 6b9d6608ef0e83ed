use chrono::Utc;
use credgate_common::HashAlgorithm;
use credgate_lib::auth::CredentialHasher;
use credgate_lib::config::HasherSettings;

use crate::test_utils::{fast_hasher_settings, STRONG_PASSWORD};

fn hasher(algorithm: HashAlgorithm) -> CredentialHasher {
    CredentialHasher::new(HasherSettings {
        algorithm,
        ..fast_hasher_settings()
    })
    .unwrap()
}

#[test]
fn test_same_password_gets_distinct_salts_and_hashes() {
    for algorithm in [HashAlgorithm::Argon2id, HashAlgorithm::Scrypt] {
        let hasher = hasher(algorithm);
        let now = Utc::now();
        let first = hasher.new_credential(STRONG_PASSWORD, now).unwrap();
        let second = hasher.new_credential(STRONG_PASSWORD, now).unwrap();

        assert_eq!(first.algorithm, algorithm);
        assert_ne!(first.salt, second.salt);
        assert_ne!(first.hash, second.hash);
        assert!(hasher.verify(STRONG_PASSWORD, &first).unwrap());
        assert!(hasher.verify(STRONG_PASSWORD, &second).unwrap());
    }
}

#[test]
fn test_hash_is_deterministic_for_a_salt() {
    let hasher = hasher(HashAlgorithm::Argon2id);
    let salt = hasher.generate_salt();
    assert_eq!(
        hasher.hash(STRONG_PASSWORD, &salt).unwrap(),
        hasher.hash(STRONG_PASSWORD, &salt).unwrap()
    );
    assert_ne!(
        hasher.hash(STRONG_PASSWORD, &salt).unwrap(),
        hasher.hash("Str0ng!Pasz", &salt).unwrap()
    );
}

#[test]
fn test_verify_rejects_near_misses() {
    let hasher = hasher(HashAlgorithm::Scrypt);
    let credential = hasher.new_credential(STRONG_PASSWORD, Utc::now()).unwrap();

    for candidate in ["", "str0ng!pass", "Str0ng!Pass ", "Str0ng!Pas"] {
        assert!(!hasher.verify(candidate, &credential).unwrap(), "{candidate:?} verified");
    }
}

#[test]
fn test_credential_verifies_after_algorithm_switch() {
    let old = hasher(HashAlgorithm::Scrypt)
        .new_credential(STRONG_PASSWORD, Utc::now())
        .unwrap();

    // New credentials use argon2id, stored scrypt ones keep verifying
    let current = hasher(HashAlgorithm::Argon2id);
    assert_eq!(current.algorithm(), HashAlgorithm::Argon2id);
    assert!(current.verify(STRONG_PASSWORD, &old).unwrap());
    assert!(!current.verify("Wr0ng!Pass", &old).unwrap());
}

#[test]
fn test_credential_debug_hides_material() {
    let credential = hasher(HashAlgorithm::Argon2id)
        .new_credential(STRONG_PASSWORD, Utc::now())
        .unwrap();
    let rendered = format!("{credential:?}");
    assert!(!rendered.contains(&credential.hash));
    assert!(!rendered.contains(&credential.salt));
}
