// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account and session lifecycle.
//!
//! [`SessionManager`] owns registration, email verification, login,
//! refresh-token rotation, logout and per-request access token checks.
//! Ledger transitions are delegated to the [`Store`], which performs each
//! one atomically.

use crate::config::Config;
use crate::db::{RotationOutcome, Store};
use crate::error::AppError;
use crate::models::token::hash_token;
use crate::models::{BlacklistEntry, PublicUser, User};
use crate::services::mailer::{EmailMessage, Mailer};
use crate::services::password::{hash_password_async, verify_password_async};
use crate::services::tokens::{IssuedToken, TokenError, TokenIssuer, TokenKind};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use validator::Validate;

/// Minimum spacing between verification emails for one account.
const RESEND_COOLDOWN_MINUTES: i64 = 5;

/// Authenticated user attached to request extensions.
///
/// Carries identity only, never credentials or the token ledger.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
    pub is_admin: bool,
}

/// The access token a request authenticated with, kept so logout can
/// blacklist it until its own expiry.
#[derive(Debug, Clone)]
pub struct PresentedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 50, message = "Username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: PublicUser,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

pub struct SessionManager {
    store: Arc<dyn Store>,
    issuer: TokenIssuer,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
    require_email_verification: bool,
}

impl SessionManager {
    pub fn new(config: &Config, store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            issuer: TokenIssuer::new(config),
            mailer,
            frontend_url: config.frontend_url.clone(),
            require_email_verification: config.require_email_verification,
        }
    }

    /// Send without failing the caller; errors are logged.
    async fn send_best_effort(&self, message: EmailMessage) {
        if let Err(e) = self.mailer.send(&message).await {
            tracing::warn!(error = %e, subject = %message.subject, "Best-effort email failed");
        }
    }

    /// Mint a verification token for `user` and the email carrying it.
    fn new_verification(&self, user: &User) -> Result<(IssuedToken, EmailMessage), AppError> {
        let issued = self.issuer.issue_verification(&user.id, &user.email)?;
        let message = EmailMessage::verification(&user.email, &self.frontend_url, &issued.token);
        Ok((issued, message))
    }

    /// Replace the stored pending verification token of an existing user.
    async fn reissue_verification(&self, user: &User) -> Result<EmailMessage, AppError> {
        let (issued, message) = self.new_verification(user)?;
        self.store
            .update_user(&user.id, &|u: &mut User| {
                u.set_verification_token(issued.token.clone(), issued.expires_at)
            })
            .await?
            .ok_or_else(AppError::user_not_found)?;
        Ok(message)
    }

    // ─── Registration and verification ───────────────────────────

    /// Create an unverified account and send the verification and welcome
    /// emails. Mail failures do not fail registration.
    pub async fn register(&self, request: RegisterRequest) -> Result<PublicUser, AppError> {
        let request = RegisterRequest {
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            password: request.password,
        };
        request.validate()?;

        let hash = hash_password_async(request.password).await?;
        let mut user = User::new(&request.username, &request.email, hash);
        let (issued, verification) = self.new_verification(&user)?;
        user.set_verification_token(issued.token, issued.expires_at);

        self.store.create_user(&user).await?;
        tracing::info!(user_id = %user.id, "User registered");

        self.send_best_effort(verification).await;
        self.send_best_effort(EmailMessage::welcome(
            &user.email,
            &user.username,
            &self.frontend_url,
        ))
        .await;

        Ok(user.projection())
    }

    /// Consume an emailed verification token. Returns the verified email.
    pub async fn verify_email(&self, token: &str) -> Result<String, AppError> {
        let claims = self
            .issuer
            .verify(TokenKind::EmailVerification, token)
            .map_err(|e| match e {
                TokenError::Expired => {
                    AppError::BadRequest("Verification link has expired".to_string())
                }
                TokenError::Invalid => {
                    AppError::BadRequest("Invalid verification token".to_string())
                }
            })?;

        let mismatch = || AppError::BadRequest("Invalid or expired verification token".to_string());

        let user = self
            .store
            .get_user(&claims.sub)
            .await?
            .ok_or_else(mismatch)?;

        let stored_matches = user
            .email_verification_token
            .as_deref()
            .map(|stored| bool::from(stored.as_bytes().ct_eq(token.as_bytes())))
            .unwrap_or(false);
        let unexpired = user
            .email_verification_expires
            .is_some_and(|expires| expires > Utc::now());
        if !stored_matches || !unexpired {
            return Err(mismatch());
        }

        self.store
            .update_user(&user.id, &|u: &mut User| u.mark_email_verified())
            .await?
            .ok_or_else(mismatch)?;
        tracing::info!(user_id = %user.id, "Email verified");
        Ok(user.email)
    }

    /// Issue and send a fresh verification email.
    ///
    /// Within the cooldown window this fails with `RateLimited` and the
    /// stored token is left untouched.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AppError> {
        let user = self
            .store
            .find_user_by_email(email.trim())
            .await?
            .ok_or_else(|| AppError::NotFound("No account found with this email".to_string()))?;

        if user.is_email_verified {
            return Err(AppError::BadRequest("Email is already verified".to_string()));
        }

        if let Some(sent_at) = user.email_verification_sent_at {
            if Utc::now() - sent_at < Duration::minutes(RESEND_COOLDOWN_MINUTES) {
                return Err(AppError::RateLimited(
                    "Please wait 5 minutes before requesting another verification email"
                        .to_string(),
                ));
            }
        }

        let message = self.reissue_verification(&user).await?;
        self.mailer.send(&message).await?;
        tracing::info!(user_id = %user.id, "Verification email resent");
        Ok(())
    }

    // ─── Sessions ────────────────────────────────────────────────

    /// Authenticate with username and password.
    ///
    /// Success replaces every prior session of the user with a single new
    /// one.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, AppError> {
        let Some(user) = self.store.find_user_by_username(username.trim()).await? else {
            verify_password_async(password.to_string(), None).await?;
            return Err(AppError::InvalidCredentials);
        };

        if self.require_email_verification && !user.is_email_verified {
            let message = self.reissue_verification(&user).await?;
            self.send_best_effort(message).await;
            return Err(AppError::VerificationRequired);
        }

        let matched =
            verify_password_async(password.to_string(), Some(user.password_hash.clone())).await?;
        if !matched {
            return Err(AppError::InvalidCredentials);
        }

        let access = self.issuer.issue_access(&user.id)?;
        let refresh = self.issuer.issue_refresh(&user.id)?;
        if !self.store.start_session(&user.id, &refresh.token).await? {
            return Err(AppError::user_not_found());
        }

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(LoginResponse {
            access_token: access.token,
            refresh_token: refresh.token,
            user: user.projection(),
        })
    }

    /// Exchange a refresh token for a new pair. A given refresh token
    /// succeeds here at most once.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AppError> {
        if self.store.is_blacklisted(&hash_token(refresh_token)).await? {
            return Err(AppError::TokenInvalidated);
        }

        let claims = self.issuer.verify(TokenKind::Refresh, refresh_token)?;

        if self.store.get_user(&claims.sub).await?.is_none() {
            return Err(AppError::user_not_found());
        }

        let access = self.issuer.issue_access(&claims.sub)?;
        let next = self.issuer.issue_refresh(&claims.sub)?;
        let retired = BlacklistEntry::new(refresh_token, claims.expires_at());

        match self
            .store
            .rotate_refresh_token(&claims.sub, refresh_token, &next.token, &retired)
            .await?
        {
            RotationOutcome::Rotated => {
                tracing::debug!(user_id = %claims.sub, "Refresh token rotated");
                Ok(RefreshResponse {
                    access_token: access.token,
                    refresh_token: next.token,
                    expires_in: self.issuer.access_ttl_seconds(),
                })
            }
            RotationOutcome::NotActive => {
                tracing::warn!(user_id = %claims.sub, "Rejected refresh token not in ledger");
                Err(AppError::TokenInvalid)
            }
            RotationOutcome::UserMissing => Err(AppError::user_not_found()),
        }
    }

    /// End the current session: blacklist the access token and, when
    /// given, revoke and blacklist the refresh token.
    pub async fn logout(
        &self,
        user: &AuthUser,
        access: &PresentedToken,
        refresh_token: Option<&str>,
    ) -> Result<(), AppError> {
        if self.store.get_user(&user.id).await?.is_none() {
            return Err(AppError::user_not_found());
        }

        if let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) {
            self.store
                .revoke_refresh_token(&user.id, refresh_token)
                .await?;
            // Tokens that no longer verify cannot be replayed anyway
            if let Ok(claims) = self.issuer.verify(TokenKind::Refresh, refresh_token) {
                if claims.sub == user.id {
                    self.store
                        .blacklist_token(&BlacklistEntry::new(refresh_token, claims.expires_at()))
                        .await?;
                }
            }
        }

        self.store
            .blacklist_token(&BlacklistEntry::new(&access.token, access.expires_at))
            .await?;

        tracing::info!(user_id = %user.id, "User logged out");
        Ok(())
    }

    /// Validate the access token of a protected request.
    pub async fn authenticate(
        &self,
        header: Option<&str>,
    ) -> Result<(AuthUser, PresentedToken), AppError> {
        let token = header
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthenticated)?;

        if self.store.is_blacklisted(&hash_token(token)).await? {
            return Err(AppError::TokenInvalidated);
        }

        let claims = self.issuer.verify(TokenKind::Access, token)?;

        let user = self
            .store
            .get_user(&claims.sub)
            .await?
            .ok_or_else(AppError::user_not_found)?;

        Ok((
            AuthUser {
                id: user.id,
                username: user.username,
                is_admin: user.is_admin,
            },
            PresentedToken {
                token: token.to_string(),
                expires_at: claims.expires_at(),
            },
        ))
    }

    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        if new_password.is_empty() {
            return Err(AppError::Validation(vec![
                "New password is required".to_string(),
            ]));
        }

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(AppError::user_not_found)?;

        let matched = verify_password_async(
            current_password.to_string(),
            Some(user.password_hash.clone()),
        )
        .await?;
        if !matched {
            return Err(AppError::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }

        let new_hash = hash_password_async(new_password.to_string()).await?;
        self.store
            .update_user(&user.id, &|u: &mut User| u.password_hash = new_hash.clone())
            .await?
            .ok_or_else(AppError::user_not_found)?;
        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }
}
