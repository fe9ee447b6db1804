// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User preference routes.

use axum::{extract::State, routing::put, Extension, Json, Router};
use serde::Deserialize;
use std::sync::Arc;

use super::{current_user, edit_user};
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{ExperienceLevel, PublicUser, User};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/users/experience-level", put(update_experience_level))
        .route("/api/users/guide-seen", put(mark_guide_seen))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceLevelRequest {
    experience_level: ExperienceLevel,
}

async fn update_experience_level(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<ExperienceLevelRequest>,
) -> Result<Json<PublicUser>> {
    let level = body.experience_level;
    let user = edit_user(&state, &auth.id, &|u: &mut User| u.experience_level = level).await?;
    Ok(Json(user.projection()))
}

async fn mark_guide_seen(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<PublicUser>> {
    let user = current_user(&state, &auth.id).await?;
    if user.has_seen_guide {
        return Ok(Json(user.projection()));
    }
    let user = edit_user(&state, &auth.id, &|u: &mut User| u.has_seen_guide = true).await?;
    Ok(Json(user.projection()))
}
