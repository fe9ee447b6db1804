// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use levelup_tracker::config::Config;
use levelup_tracker::db::{FirestoreDb, MemoryDb, Store};
use levelup_tracker::error::AppError;
use levelup_tracker::models::User;
use levelup_tracker::routes::create_router;
use levelup_tracker::services::{EmailMessage, Mailer};
use levelup_tracker::AppState;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Mailer that keeps every message for inspection.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[allow(dead_code)]
impl RecordingMailer {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

/// Full router over an in-memory store.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub db: Arc<MemoryDb>,
    pub mailer: Arc<RecordingMailer>,
}

/// Create a test app with in-memory storage and a recording mailer.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> TestApp {
    let db = Arc::new(MemoryDb::default());
    let mailer = Arc::new(RecordingMailer::default());
    let state = Arc::new(AppState::new(config, db.clone(), mailer.clone()));
    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        mailer,
    }
}

#[allow(dead_code)]
impl TestApp {
    /// Send a request and decode the JSON body (`Value::Null` if empty).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("x-auth-token", token);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Register, verify via the stored token and return the user ID.
    pub async fn register_verified(&self, username: &str, password: &str) -> String {
        let email = format!("{}@example.com", username);
        let (status, _) = self
            .post(
                "/api/auth/register",
                None,
                serde_json::json!({ "username": username, "email": email, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let user = self
            .db
            .find_user_by_username(username)
            .await
            .unwrap()
            .unwrap();
        let token = user.email_verification_token.clone().unwrap();
        let (status, _) = self
            .request(
                Method::GET,
                &format!("/api/auth/verify-email/{}", token),
                None,
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        user.id
    }

    /// Log in and return `(accessToken, refreshToken)`.
    pub async fn login(&self, username: &str, password: &str) -> (String, String) {
        let (status, body) = self
            .post(
                "/api/auth/login",
                None,
                serde_json::json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        (
            body["accessToken"].as_str().unwrap().to_string(),
            body["refreshToken"].as_str().unwrap().to_string(),
        )
    }

    /// Registered, verified and logged-in user: `(user_id, access_token)`.
    pub async fn signed_in(&self, username: &str) -> (String, String) {
        let id = self.register_verified(username, "secret1").await;
        let (access, _) = self.login(username, "secret1").await;
        (id, access)
    }

    /// Grant admin to an existing user.
    pub async fn make_admin(&self, user_id: &str) {
        self.db
            .update_user(user_id, &|u: &mut User| u.is_admin = true)
            .await
            .unwrap()
            .expect("user exists");
    }
}
