use axum::{body::to_bytes, http::StatusCode, response::IntoResponse};
use credgate_lib::error::AuthError;
use credgate_lib::validation::Violation;
use serde_json::Value;

async fn body_json(err: AuthError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_invalid_credentials_body_never_counts_attempts() {
    let (status, body) = body_json(AuthError::InvalidCredentials {
        attempts_remaining: Some(2),
    })
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_001");
    assert_eq!(body["error"]["message"], "Invalid username or password");
}

#[tokio::test]
async fn test_locked_body_reports_wait() {
    let (status, body) = body_json(AuthError::AccountLocked {
        seconds_remaining: 899,
    })
    .await;

    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["error"]["code"], "AUTH_002");
    assert!(body["error"]["message"].as_str().unwrap().contains("899"));
}

#[tokio::test]
async fn test_rejected_password_body_lists_rules() {
    let (status, body) = body_json(AuthError::PasswordRejected(vec![
        Violation::MissingUppercase,
        Violation::RecentlyUsed { history_size: 3 },
    ]))
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("uppercase"));
    assert!(message.contains("last 3"));
}

#[tokio::test]
async fn test_storage_body_hides_cause() {
    let (status, body) = body_json(AuthError::StorageUnavailable(
        "/var/lib/credgate/accounts: permission denied".into(),
    ))
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "STORE_001");
    assert!(!body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("/var/lib"));
}
