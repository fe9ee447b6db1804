// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Signing secrets are read once at startup; a missing secret is fatal and
//! the server refuses to start.

use chrono::{Duration, Utc};
use std::env;

/// Which persistence backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Firestore,
    Memory,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL used in email links and share links
    pub frontend_url: String,
    /// Extra CORS origins (DEV/PROD frontends)
    pub allowed_origins: Vec<String>,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Persistence backend
    pub storage: StorageBackend,
    /// Gate login on a verified email address
    pub require_email_verification: bool,

    // --- Token lifetimes ---
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub verification_token_ttl: Duration,

    // --- Secrets ---
    /// HS256 key for access tokens
    pub jwt_access_secret: Vec<u8>,
    /// HS256 key for refresh tokens
    pub jwt_refresh_secret: Vec<u8>,
    /// HS256 key for email verification tokens
    pub email_verification_secret: Vec<u8>,

    // --- Mail ---
    /// Transactional mail HTTP endpoint. `None` selects the log-only mailer.
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
}

impl Config {
    /// Deterministic config for tests.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            allowed_origins: Vec::new(),
            gcp_project_id: "test-project".to_string(),
            port: 4500,
            storage: StorageBackend::Memory,
            require_email_verification: true,
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            verification_token_ttl: Duration::hours(24),
            jwt_access_secret: b"test_access_key_32_bytes_minimum!".to_vec(),
            jwt_refresh_secret: b"test_refresh_key_32_bytes_minimum".to_vec(),
            email_verification_secret: b"test_verify_key_32_bytes_minimum!".to_vec(),
            mail_api_url: None,
            mail_api_key: None,
            mail_from: "Level Up <no-reply@localhost>".to_string(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let storage = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "firestore" => StorageBackend::Firestore,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError::Invalid(
                    "STORAGE_BACKEND",
                    format!("unknown backend '{}'", other),
                ))
            }
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            allowed_origins: env::var("ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "4500".to_string())
                .parse()
                .unwrap_or(4500),
            storage,
            require_email_verification: env::var("REQUIRE_EMAIL_VERIFICATION")
                .map(|v| !matches!(v.trim(), "false" | "0" | "no"))
                .unwrap_or(true),

            access_token_ttl: duration_var("JWT_ACCESS_EXPIRATION", "15m")?,
            refresh_token_ttl: duration_var("JWT_REFRESH_EXPIRATION", "7d")?,
            verification_token_ttl: Duration::hours(24),

            jwt_access_secret: secret_var("JWT_ACCESS_SECRET")?,
            jwt_refresh_secret: secret_var("JWT_REFRESH_SECRET")?,
            email_verification_secret: secret_var("EMAIL_VERIFICATION_SECRET")?,

            mail_api_url: env::var("MAIL_API_URL").ok().filter(|v| !v.is_empty()),
            mail_api_key: env::var("MAIL_API_KEY").ok().map(|v| v.trim().to_string()),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Level Up <no-reply@localhost>".to_string()),
        })
    }
}

fn secret_var(name: &'static str) -> Result<Vec<u8>, ConfigError> {
    let value = env::var(name).map_err(|_| ConfigError::Missing(name))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::Missing(name));
    }
    Ok(value.as_bytes().to_vec())
}

fn duration_var(name: &'static str, default: &str) -> Result<Duration, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_duration(&raw).ok_or_else(|| ConfigError::Invalid(name, raw))
}

/// Parse `"<n>s"`, `"<n>m"`, `"<n>h"`, `"<n>d"` or bare seconds.
///
/// Values too large to add to the current time are rejected.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((idx, _)) => raw.split_at(idx),
        None => (raw, "s"),
    };
    let n: i64 = digits.parse().ok()?;
    if n <= 0 {
        return None;
    }
    let duration = match unit {
        "s" => Duration::try_seconds(n),
        "m" => Duration::try_minutes(n),
        "h" => Duration::try_hours(n),
        "d" => Duration::try_days(n),
        _ => None,
    }?;
    Utc::now().checked_add_signed(duration).map(|_| duration)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
