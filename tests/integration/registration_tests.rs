use credgate_lib::auth::AuthService;
use credgate_lib::error::AuthError;
use credgate_lib::storage::{AccountStore, InMemoryStore};
use futures_util::future::join_all;

use crate::test_utils::{flat_file_env, memory_env, TestEnv, STRONG_PASSWORD};

async fn race_duplicate_registrations<S: AccountStore>(env: &TestEnv<S>) {
    let attempts = (0..8).map(|i| {
        let email = format!("alice{i}@x.com");
        let auth = &env.auth;
        async move { auth.register("alice", &email, STRONG_PASSWORD).await }
    });
    let results = join_all(attempts).await;

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, AuthError::DuplicateAccount)));
}

#[tokio::test]
async fn test_concurrent_duplicates_in_memory() {
    let env = memory_env();
    race_duplicate_registrations(&env).await;
    let store: &InMemoryStore = &env.store;
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_concurrent_duplicates_in_flat_files() {
    let (env, temp_dir) = flat_file_env();
    race_duplicate_registrations(&env).await;

    let records = std::fs::read_dir(temp_dir.path().join("accounts"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
        .count();
    assert_eq!(records, 1);
}

#[tokio::test]
async fn test_duplicate_username_or_email() {
    let env = memory_env();
    env.auth.register("alice", "a@x.com", STRONG_PASSWORD).await.unwrap();

    let same_name = env.auth.register("alice", "b@x.com", STRONG_PASSWORD).await;
    assert!(matches!(same_name, Err(AuthError::DuplicateAccount)));

    let same_email = env.auth.register("bob", "a@x.com", STRONG_PASSWORD).await;
    assert!(matches!(same_email, Err(AuthError::DuplicateAccount)));

    // A failed email claim must not leave the username reserved
    env.auth.register("bob", "b@x.com", STRONG_PASSWORD).await.unwrap();
}

#[tokio::test]
async fn test_registration_input_is_validated() {
    let env = memory_env();

    let weak = env.auth.register("alice", "a@x.com", "hello").await;
    assert!(matches!(weak, Err(AuthError::PasswordRejected(v)) if v.len() == 4));

    let bad_email = env.auth.register("alice", "not-an-email", STRONG_PASSWORD).await;
    assert!(matches!(bad_email, Err(AuthError::InvalidInput(_))));

    let bad_name = env.auth.register("al ice", "a@x.com", STRONG_PASSWORD).await;
    assert!(matches!(bad_name, Err(AuthError::InvalidInput(_))));

    assert!(env.store.is_empty());
}

#[tokio::test]
async fn test_registered_account_is_readable() {
    let (env, _temp_dir) = flat_file_env();
    let alice = env
        .auth
        .register("  alice ", " a@x.com", STRONG_PASSWORD)
        .await
        .unwrap();
    assert_eq!(alice.username, "alice");
    assert_eq!(alice.email, "a@x.com");

    let fetched = env.auth.account(alice.id).await.unwrap().unwrap();
    assert_eq!(fetched, alice);

    let stored = env.store.find_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(stored.failed_login_attempts, 0);
    assert!(stored.reset_token.is_none());
    assert!(stored.credential_history.is_empty());
}
