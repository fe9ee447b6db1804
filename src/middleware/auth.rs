// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access token authentication middleware.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

pub use crate::services::sessions::{AuthUser, PresentedToken};

/// Header carrying the access token.
pub const AUTH_HEADER: &str = "x-auth-token";

/// Middleware that requires a valid, non-blacklisted access token.
///
/// Inserts [`AuthUser`] and the [`PresentedToken`] into request extensions.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTH_HEADER)
        .and_then(|h| h.to_str().ok());

    let (user, token) = state.sessions.authenticate(header).await?;

    request.extensions_mut().insert(user);
    request.extensions_mut().insert(token);

    Ok(next.run(request).await)
}
