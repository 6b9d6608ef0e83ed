use chrono::Duration;
use credgate_common::LockState;
use credgate_lib::auth::AuthService;
use credgate_lib::config::PasswordPolicy;
use credgate_lib::error::AuthError;
use credgate_lib::storage::AccountStore;
use futures_util::future::join_all;

use crate::test_utils::{flat_file_env, memory_env, TestEnv, STRONG_PASSWORD};

async fn lock_out_alice<S: AccountStore>(env: &TestEnv<S>) {
    env.auth.register("alice", "a@x.com", STRONG_PASSWORD).await.unwrap();

    for remaining in [2, 1] {
        let err = env.auth.login("alice", "wrong").await.unwrap_err();
        assert!(
            matches!(err, AuthError::InvalidCredentials { attempts_remaining: Some(n) } if n == remaining),
            "unexpected {err:?}"
        );
    }
    let third = env.auth.login("alice", "wrong").await.unwrap_err();
    assert!(matches!(third, AuthError::AccountLocked { .. }), "unexpected {third:?}");
}

#[tokio::test]
async fn test_lockout_and_recovery() {
    let env = memory_env();
    lock_out_alice(&env).await;

    // Correct password during the lock is still refused
    let err = env.auth.login("alice", STRONG_PASSWORD).await.unwrap_err();
    match err {
        AuthError::AccountLocked { seconds_remaining } => assert_eq!(seconds_remaining, 900),
        other => panic!("expected AccountLocked, got {other:?}"),
    }

    env.clock.advance(Duration::seconds(901));
    let summary = env.auth.login("alice", STRONG_PASSWORD).await.unwrap();
    assert_eq!(summary.username, "alice");

    let stored = env.store.find_by_username("alice").await.unwrap().unwrap();
    assert_eq!(stored.failed_login_attempts, 0);
    assert_eq!(stored.lock_state, LockState::Unlocked);
}

#[tokio::test]
async fn test_lockout_persists_in_flat_files() {
    let (env, _temp_dir) = flat_file_env();
    lock_out_alice(&env).await;

    env.clock.advance(Duration::seconds(600));
    let err = env.auth.login("alice", STRONG_PASSWORD).await.unwrap_err();
    assert!(matches!(err, AuthError::AccountLocked { seconds_remaining: 300 }));

    env.clock.advance(Duration::seconds(300));
    env.auth.login("alice", STRONG_PASSWORD).await.unwrap();
}

#[tokio::test]
async fn test_lapsed_lock_restarts_the_count() {
    let env = memory_env();
    lock_out_alice(&env).await;
    env.clock.advance(Duration::minutes(16));

    // First failure after the lock lapses counts from zero again
    let err = env.auth.login("alice", "wrong").await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::InvalidCredentials { attempts_remaining: Some(2) }
    ));
}

#[tokio::test]
async fn test_success_resets_failed_attempts() {
    let env = memory_env();
    env.auth.register("alice", "a@x.com", STRONG_PASSWORD).await.unwrap();

    env.auth.login("alice", "wrong").await.unwrap_err();
    env.auth.login("alice", "wrong").await.unwrap_err();
    env.auth.login("alice", STRONG_PASSWORD).await.unwrap();

    let stored = env.store.find_by_username("alice").await.unwrap().unwrap();
    assert_eq!(stored.failed_login_attempts, 0);

    // Two more failures are not enough to lock again
    env.auth.login("alice", "wrong").await.unwrap_err();
    let err = env.auth.login("alice", "wrong").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials { .. }));
}

#[tokio::test]
async fn test_concurrent_failures_are_not_lost() {
    let env = memory_env();
    env.policy
        .update(PasswordPolicy {
            max_login_attempts: 5,
            ..PasswordPolicy::default()
        })
        .unwrap();
    env.auth.register("alice", "a@x.com", STRONG_PASSWORD).await.unwrap();

    let attempts = (0..4).map(|_| env.auth.login("alice", "wrong"));
    let results = join_all(attempts).await;
    assert!(results
        .iter()
        .all(|r| matches!(r, Err(AuthError::InvalidCredentials { .. }))));

    let stored = env.store.find_by_username("alice").await.unwrap().unwrap();
    assert_eq!(stored.failed_login_attempts, 4);

    let err = env.auth.login("alice", "wrong").await.unwrap_err();
    assert!(matches!(err, AuthError::AccountLocked { .. }));
}

#[tokio::test]
async fn test_username_is_case_sensitive() {
    let env = memory_env();
    env.auth.register("alice", "a@x.com", STRONG_PASSWORD).await.unwrap();

    let err = env.auth.login("Alice", STRONG_PASSWORD).await.unwrap_err();
    assert!(matches!(
        err,
        AuthError::InvalidCredentials { attempts_remaining: None }
    ));
}

#[tokio::test]
async fn test_change_password_rotates_credential() {
    let env = memory_env();
    let alice = env.auth.register("alice", "a@x.com", STRONG_PASSWORD).await.unwrap();

    env.auth
        .change_password(alice.id, STRONG_PASSWORD, "N3w!Passphrase")
        .await
        .unwrap();

    assert!(env.auth.login("alice", STRONG_PASSWORD).await.is_err());
    env.auth.login("alice", "N3w!Passphrase").await.unwrap();

    let stored = env.store.find_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(stored.credential_history.len(), 1);
}

#[tokio::test]
async fn test_change_password_with_wrong_current_counts_as_failure() {
    let env = memory_env();
    let alice = env.auth.register("alice", "a@x.com", STRONG_PASSWORD).await.unwrap();

    let err = env
        .auth
        .change_password(alice.id, "Wr0ng!Pass", "N3w!Passphrase")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::InvalidCredentials { attempts_remaining: Some(2) }
    ));

    let stored = env.store.find_by_id(alice.id).await.unwrap().unwrap();
    assert_eq!(stored.failed_login_attempts, 1);
}
