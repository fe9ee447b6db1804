// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::to_bytes;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use levelup_tracker::error::AppError;
use serde_json::Value;

async fn render(err: AppError) -> (StatusCode, Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_expired_token_is_flagged() {
    let (status, body) = render(AppError::TokenExpired).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["tokenExpired"], true);
    assert_eq!(body["statusCode"], 401);

    let (_, body) = render(AppError::TokenInvalid).await;
    assert!(body.get("tokenExpired").is_none());
}

#[tokio::test]
async fn test_verification_required_is_flagged() {
    let (status, body) = render(AppError::VerificationRequired).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["requiresVerification"], true);
}

#[tokio::test]
async fn test_validation_lists_messages() {
    let (status, body) = render(AppError::Validation(vec![
        "Name is required".to_string(),
        "Target is required".to_string(),
    ]))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_internal_details_are_not_leaked() {
    let (status, body) = render(AppError::Database("connection reset".to_string())).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal Server Error");

    let (status, body) = render(AppError::Mail("smtp down".to_string())).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["message"], "Error sending email");
}

#[test]
fn test_status_mapping() {
    assert_eq!(
        AppError::Conflict("dup".into()).status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        AppError::StaleWrite("stale".into()).status(),
        StatusCode::CONFLICT
    );
    assert_eq!(
        AppError::RateLimited("slow down".into()).status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(AppError::user_not_found().status(), StatusCode::NOT_FOUND);
}
