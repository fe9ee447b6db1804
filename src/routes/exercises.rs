// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exercise catalog routes under `/api/exercises`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use super::{current_user, edit_user, require_admin, MessageResponse};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::exercise::DEFAULT_IMAGE_URL;
use crate::models::{
    DeletedExercise, Exercise, ExerciseCategory, Recommendation, Recommendations, User,
};
use crate::services::entitlements::{can_delete, can_view, edit_action, DeleteAction, EditAction};
use crate::services::{ExerciseView, Viewer};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/exercises", get(list_exercises).post(create_exercise))
        .route("/api/exercises/default", post(create_default_exercise))
        .route("/api/exercises/deleted", get(list_deleted))
        .route("/api/exercises/restore/{id}", post(restore_exercise))
        .route(
            "/api/exercises/{id}",
            get(get_exercise)
                .put(update_exercise)
                .delete(delete_exercise),
        )
        .route(
            "/api/exercises/{id}/user-recommendation",
            put(update_user_recommendation),
        )
}

/// A single string is accepted where a list is expected.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseInput {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    target: Option<OneOrMany>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    category: Option<ExerciseCategory>,
    #[serde(default)]
    exercise_type: Option<String>,
    #[serde(default)]
    measurement_type: Option<String>,
    #[serde(default)]
    recommendations: Option<Recommendations>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ExerciseInput {
    /// A new exercise from this input. Kinds derive from the category
    /// unless given explicitly.
    fn into_exercise(self, owner: Option<String>, is_default: bool) -> Result<Exercise> {
        let category = self.category.unwrap_or_default();
        let (exercise_type, measurement_type) = category.kinds();
        let now = Utc::now();
        let exercise = Exercise {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name.unwrap_or_default().trim().to_string(),
            description: self.description.unwrap_or_default().trim().to_string(),
            target: self.target.map(OneOrMany::into_vec).unwrap_or_default(),
            image_url: non_empty(self.image_url).unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
            category,
            exercise_type: non_empty(self.exercise_type)
                .unwrap_or_else(|| exercise_type.to_string()),
            measurement_type: non_empty(self.measurement_type)
                .unwrap_or_else(|| measurement_type.to_string()),
            recommendations: self.recommendations.unwrap_or_default(),
            user: owner,
            is_default,
            imported_from: None,
            created_at: now,
            updated_at: now,
        };
        exercise.validate()?;
        Ok(exercise)
    }

    /// Overwrite the shared record with whatever was provided.
    fn apply_to(self, exercise: &mut Exercise) -> Result<()> {
        if let Some(name) = non_empty(self.name) {
            exercise.name = name;
        }
        if let Some(description) = non_empty(self.description) {
            exercise.description = description;
        }
        if let Some(target) = self.target {
            exercise.target = target.into_vec();
        }
        if let Some(image_url) = non_empty(self.image_url) {
            exercise.image_url = image_url;
        }
        if let Some(category) = self.category {
            exercise.category = category;
        }
        if let Some(exercise_type) = non_empty(self.exercise_type) {
            exercise.exercise_type = exercise_type;
        }
        if let Some(measurement_type) = non_empty(self.measurement_type) {
            exercise.measurement_type = measurement_type;
        }
        if let Some(recommendations) = self.recommendations {
            exercise.recommendations = recommendations;
        }
        exercise.updated_at = Utc::now();
        exercise.validate()?;
        Ok(())
    }
}

async fn load_exercise(state: &AppState, id: &str) -> Result<Exercise> {
    state
        .db
        .get_exercise(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exercise not found".to_string()))
}

// ─── Listing and lookup ──────────────────────────────────────

async fn list_exercises(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ExerciseView>>> {
    let user = current_user(&state, &auth.id).await?;
    let viewer = Viewer::for_exercises(&user);

    let exercises = state
        .db
        .list_exercises_for_user(&user.id)
        .await?
        .into_iter()
        .filter(|e| viewer.sees(e))
        .map(|e| ExerciseView::summary(e, &user))
        .collect();

    Ok(Json(exercises))
}

async fn get_exercise(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ExerciseView>> {
    let exercise = load_exercise(&state, &id).await?;
    let user = current_user(&state, &auth.id).await?;
    can_view(&Viewer::for_exercises(&user), &exercise)?;
    Ok(Json(ExerciseView::detail(exercise, &user)))
}

// ─── Create ──────────────────────────────────────────────────

async fn create_exercise(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(mut input): Json<ExerciseInput>,
) -> Result<(StatusCode, Json<Exercise>)> {
    let user = current_user(&state, &auth.id).await?;

    // A regular user's recommendations are personal: they go in the overlay
    // for the user's current level, not on the record.
    let personal_rec = if user.is_admin {
        None
    } else {
        input
            .recommendations
            .take()
            .and_then(|r| r.get(user.experience_level).cloned())
    };

    let exercise = input.into_exercise(Some(user.id.clone()), false)?;
    state.db.save_exercise(&exercise).await?;

    if let Some(rec) = personal_rec {
        edit_user(&state, &user.id, &|u: &mut User| {
            u.overlay_mut(&exercise.id).recommendation = Some(rec.clone())
        })
        .await?;
    }

    tracing::info!(user_id = %user.id, exercise_id = %exercise.id, "Exercise created");
    Ok((StatusCode::CREATED, Json(exercise)))
}

async fn create_default_exercise(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<ExerciseInput>,
) -> Result<(StatusCode, Json<Exercise>)> {
    require_admin(&auth)?;
    let exercise = input.into_exercise(None, true)?;
    state.db.save_exercise(&exercise).await?;
    tracing::info!(exercise_id = %exercise.id, "Default exercise created");
    Ok((StatusCode::CREATED, Json(exercise)))
}

// ─── Update ──────────────────────────────────────────────────

async fn update_exercise(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(input): Json<ExerciseInput>,
) -> Result<Json<ExerciseView>> {
    let mut exercise = load_exercise(&state, &id).await?;
    let user = current_user(&state, &auth.id).await?;
    let action = edit_action(&Viewer::for_exercises(&user), &exercise)?;
    let level = user.experience_level;
    let level_rec = input
        .recommendations
        .as_ref()
        .and_then(|r| r.get(level).cloned());

    match action {
        EditAction::Update => {
            input.apply_to(&mut exercise)?;
            state.db.save_exercise(&exercise).await?;

            // The caller's overlay recommendation shadows the record; keep
            // it in step.
            let shadowed = user
                .overlay(&exercise.id)
                .is_some_and(|o| o.recommendation.is_some());
            let user = match level_rec {
                Some(rec) if shadowed => {
                    edit_user(&state, &user.id, &|u: &mut User| {
                        let overlay = u.overlay_mut(&exercise.id);
                        let mut merged = overlay.recommendation.take().unwrap_or_default();
                        merged.merge_from(&rec);
                        overlay.recommendation = Some(merged);
                    })
                    .await?
                }
                _ => user,
            };
            Ok(Json(ExerciseView::summary(exercise, &user)))
        }
        EditAction::Overlay => {
            let base_rec = exercise.recommendations.get(level).cloned();
            let name = non_empty(input.name);
            let description = non_empty(input.description);
            let target = input.target.map(OneOrMany::into_vec);
            let image_url = non_empty(input.image_url);

            let user = edit_user(&state, &user.id, &|u: &mut User| {
                let overlay = u.overlay_mut(&exercise.id);
                if let Some(name) = &name {
                    overlay.name = Some(name.clone());
                }
                if let Some(description) = &description {
                    overlay.description = Some(description.clone());
                }
                if let Some(target) = &target {
                    overlay.target = Some(target.clone());
                }
                if let Some(image_url) = &image_url {
                    overlay.image_url = Some(image_url.clone());
                }
                if let Some(rec) = &level_rec {
                    let mut merged = overlay
                        .recommendation
                        .take()
                        .or_else(|| base_rec.clone())
                        .unwrap_or_default();
                    merged.merge_from(rec);
                    overlay.recommendation = Some(merged);
                }
            })
            .await?;
            Ok(Json(ExerciseView::summary(exercise, &user)))
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecommendationResponse {
    pub user_recommendation: Recommendation,
}

async fn update_user_recommendation(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(rec): Json<Recommendation>,
) -> Result<Json<UserRecommendationResponse>> {
    let exercise = load_exercise(&state, &id).await?;
    let user = current_user(&state, &auth.id).await?;
    can_view(&Viewer::for_exercises(&user), &exercise)?;

    let user = edit_user(&state, &user.id, &|u: &mut User| {
        let overlay = u.overlay_mut(&exercise.id);
        let mut merged = overlay.recommendation.take().unwrap_or_default();
        merged.merge_from(&rec);
        overlay.recommendation = Some(merged);
    })
    .await?;
    let merged = user
        .overlay(&exercise.id)
        .and_then(|o| o.recommendation.clone())
        .unwrap_or_default();
    Ok(Json(UserRecommendationResponse {
        user_recommendation: merged,
    }))
}

// ─── Delete and restore ──────────────────────────────────────

async fn delete_exercise(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let exercise = load_exercise(&state, &id).await?;
    let user = current_user(&state, &auth.id).await?;
    let action = can_delete(&Viewer::for_exercises(&user), &exercise)?;

    let record = DeletedExercise {
        id: uuid::Uuid::new_v4().to_string(),
        exercise_id: exercise.id.clone(),
        is_default: exercise.is_default,
        exercise_data: exercise,
        deleted_by: user.id.clone(),
        deleted_at: Utc::now(),
        removed: action == DeleteAction::Remove,
    };
    // The archive is for recovery only; a failed write does not block the delete
    if let Err(e) = state.db.archive_exercise(&record).await {
        tracing::warn!(error = %e, exercise_id = %record.exercise_id, "Failed to archive exercise");
    }

    match action {
        DeleteAction::Remove => {
            state.db.delete_exercise(&record.exercise_id).await?;
            tracing::info!(user_id = %user.id, exercise_id = %record.exercise_id, "Exercise deleted");
            Ok(MessageResponse::new("Exercise deleted successfully"))
        }
        DeleteAction::Hide => {
            edit_user(&state, &user.id, &|u: &mut User| {
                u.deleted_exercises.insert(record.exercise_id.clone());
            })
            .await?;
            Ok(MessageResponse::new("Exercise removed from your view"))
        }
    }
}

async fn list_deleted(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<DeletedExercise>>> {
    require_admin(&auth)?;
    Ok(Json(state.db.list_deleted_exercises().await?))
}

#[derive(Serialize)]
pub struct RestoreResponse {
    pub message: String,
    pub exercise: Exercise,
}

async fn restore_exercise(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<RestoreResponse>> {
    let record = state
        .db
        .get_deleted_exercise(&id)
        .await?
        .ok_or_else(|| AppError::NotFound("Deleted exercise not found".to_string()))?;

    if !auth.is_admin && record.deleted_by != auth.id {
        return Err(AppError::Forbidden(
            "Not authorized to restore this exercise".to_string(),
        ));
    }

    if record.removed {
        if state.db.get_exercise(&record.exercise_id).await?.is_none() {
            state.db.save_exercise(&record.exercise_data).await?;
        }
    } else {
        state
            .db
            .update_user(&record.deleted_by, &|u: &mut User| {
                u.deleted_exercises.remove(&record.exercise_id);
            })
            .await?;
    }

    state.db.remove_deleted_exercise(&record.id).await?;
    tracing::info!(user_id = %auth.id, exercise_id = %record.exercise_id, "Exercise restored");

    Ok(Json(RestoreResponse {
        message: "Exercise restored successfully".to_string(),
        exercise: record.exercise_data,
    }))
}
