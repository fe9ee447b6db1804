// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account and session routes under `/api/auth`.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::ValidateEmail;

use super::{current_user, edit_user, MessageResponse};
use crate::error::{AppError, Result};
use crate::middleware::auth::{AuthUser, PresentedToken};
use crate::models::{ExperienceLevel, PublicUser, User};
use crate::services::sessions::{LoginResponse, RefreshResponse, RegisterRequest};
use crate::AppState;

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/verify-email/{token}", get(verify_email))
        .route("/api/auth/resend-verification", post(resend_verification))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh-token", post(refresh_token))
}

pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/logout", post(logout))
        .route(
            "/api/auth/user",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/api/auth/change-password", put(change_password))
}

// ─── Registration ────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub requires_verification: bool,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    state.sessions.register(body).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful. Please check your email to verify your account."
                .to_string(),
            requires_verification: true,
        }),
    ))
}

#[derive(Serialize)]
pub struct VerifyEmailResponse {
    pub message: String,
    pub email: String,
}

async fn verify_email(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<VerifyEmailResponse>> {
    let email = state.sessions.verify_email(&token).await?;
    Ok(Json(VerifyEmailResponse {
        message: "Email verified successfully! You can now log in.".to_string(),
        email,
    }))
}

#[derive(Deserialize)]
pub struct ResendRequest {
    #[serde(default)]
    email: String,
}

async fn resend_verification(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResendRequest>,
) -> Result<Json<MessageResponse>> {
    if body.email.trim().is_empty() {
        return Err(AppError::BadRequest("Email is required".to_string()));
    }
    state.sessions.resend_verification(&body.email).await?;
    Ok(MessageResponse::new("Verification email sent successfully"))
}

// ─── Sessions ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    if body.username.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::InvalidCredentials);
    }
    Ok(Json(state.sessions.login(&body.username, &body.password).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    refresh_token: Option<String>,
}

async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>> {
    let token = body
        .refresh_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("Refresh token is required".to_string()))?;
    Ok(Json(state.sessions.refresh(&token).await?))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Extension(token): Extension<PresentedToken>,
    body: Bytes,
) -> Result<Json<MessageResponse>> {
    // Body is optional; anything unparseable means no refresh token
    let refresh = serde_json::from_slice::<RefreshRequest>(&body)
        .ok()
        .and_then(|b| b.refresh_token);
    state
        .sessions
        .logout(&user, &token, refresh.as_deref())
        .await?;
    Ok(MessageResponse::new("Logged out successfully"))
}

// ─── Current user ────────────────────────────────────────────

async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<PublicUser>> {
    Ok(Json(current_user(&state, &user.id).await?.projection()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    experience_level: Option<ExperienceLevel>,
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<PublicUser>> {
    let user = current_user(&state, &auth.id).await?;

    let mut new_username = None;
    if let Some(username) = body.username.map(|u| u.trim().to_string()) {
        if username.is_empty() {
            return Err(AppError::Validation(vec!["Username is required".to_string()]));
        }
        if username != user.username {
            if state.db.find_user_by_username(&username).await?.is_some() {
                return Err(AppError::Conflict("Username is already taken".to_string()));
            }
            new_username = Some(username);
        }
    }

    let mut new_email = None;
    if let Some(email) = body.email.map(|e| e.trim().to_string()) {
        if !email.validate_email() {
            return Err(AppError::Validation(vec![
                "A valid email is required".to_string(),
            ]));
        }
        if email != user.email {
            if state.db.find_user_by_email(&email).await?.is_some() {
                return Err(AppError::Conflict("Email is already in use".to_string()));
            }
            new_email = Some(email);
        }
    }

    let level = body.experience_level;
    let updated = edit_user(&state, &auth.id, &|u: &mut User| {
        if let Some(username) = &new_username {
            u.username = username.clone();
        }
        if let Some(email) = &new_email {
            u.email = email.clone();
        }
        if let Some(level) = level {
            u.experience_level = level;
        }
    })
    .await?;
    Ok(Json(updated.projection()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_password: String,
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    state
        .sessions
        .change_password(&user.id, &body.current_password, &body.new_password)
        .await?;
    Ok(MessageResponse::new("Password changed successfully"))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Extension(token): Extension<PresentedToken>,
) -> Result<Json<MessageResponse>> {
    let removed = state.db.delete_user_cascade(&user.id).await?;
    state
        .db
        .blacklist_token(&crate::models::BlacklistEntry::new(
            &token.token,
            token.expires_at,
        ))
        .await?;
    tracing::info!(user_id = %user.id, documents = removed, "Account deleted");
    Ok(MessageResponse::new("User account and all associated data deleted"))
}
