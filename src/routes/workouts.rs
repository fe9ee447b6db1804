// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Logged workouts and in-progress session routes under `/api/workouts`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::MessageResponse;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::workout::{
    ExerciseHistoryEntry, ExerciseProgress, ProgressSet, WorkoutExercise,
};
use crate::models::{Workout, WorkoutProgress};
use crate::AppState;

/// Sessions returned by the exercise history endpoint.
const HISTORY_LIMIT: usize = 5;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/workouts", post(create_workout))
        .route("/api/workouts/user", get(list_workouts))
        .route("/api/workouts/last/{plan_id}", get(last_workout_for_plan))
        .route(
            "/api/workouts/exercise-history/{exercise_id}",
            get(exercise_history),
        )
        .route(
            "/api/workouts/progress",
            get(get_progress).post(save_progress).delete(clear_progress),
        )
        .route("/api/workouts/progress/new", post(new_progress))
        .route(
            "/api/workouts/{id}",
            get(get_workout).put(update_workout).delete(delete_workout),
        )
}

// ─── Logged workouts ─────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutInput {
    #[serde(default)]
    plan: Option<String>,
    #[serde(default)]
    plan_name: Option<String>,
    #[serde(default)]
    exercises: Option<Vec<WorkoutExercise>>,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    total_pause_time: Option<f64>,
    #[serde(default)]
    skipped_pauses: Option<u32>,
    #[serde(default)]
    progression: Option<f64>,
}

/// Owner-only lookup. Other users' workouts are reported as missing.
async fn load_owned_workout(state: &AppState, user_id: &str, id: &str) -> Result<Workout> {
    state
        .db
        .get_workout(id)
        .await?
        .filter(|w| w.user == user_id)
        .ok_or_else(|| AppError::NotFound("Workout not found".to_string()))
}

async fn list_workouts(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Workout>>> {
    Ok(Json(state.db.list_workouts_for_user(&auth.id).await?))
}

async fn create_workout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<WorkoutInput>,
) -> Result<(StatusCode, Json<Workout>)> {
    let mut errors = Vec::new();
    let plan_name = input
        .plan_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if plan_name.is_none() {
        errors.push("Plan name is required".to_string());
    }
    let exercises = input.exercises.filter(|e| !e.is_empty());
    if exercises.is_none() {
        errors.push("At least one exercise is required".to_string());
    }
    if input.start_time.is_none() {
        errors.push("Start time is required".to_string());
    }
    if input.end_time.is_none() {
        errors.push("End time is required".to_string());
    }

    let (Some(plan_name), Some(exercises), Some(start_time), Some(end_time)) =
        (plan_name, exercises, input.start_time, input.end_time)
    else {
        return Err(AppError::Validation(errors));
    };

    let now = Utc::now();
    let workout = Workout {
        id: uuid::Uuid::new_v4().to_string(),
        user: auth.id.clone(),
        plan: input.plan.filter(|p| !p.is_empty()),
        plan_name,
        plan_deleted: false,
        exercises,
        start_time,
        end_time,
        total_pause_time: input.total_pause_time.unwrap_or(0.0),
        skipped_pauses: input.skipped_pauses.unwrap_or(0),
        progression: input.progression.unwrap_or(0.0),
        created_at: now,
        updated_at: now,
    };
    state.db.save_workout(&workout).await?;

    tracing::info!(user_id = %auth.id, workout_id = %workout.id, "Workout logged");
    Ok((StatusCode::CREATED, Json(workout)))
}

async fn last_workout_for_plan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(plan_id): Path<String>,
) -> Result<Response> {
    let last = state
        .db
        .list_workouts_for_user(&auth.id)
        .await?
        .into_iter()
        .find(|w| w.plan.as_deref() == Some(plan_id.as_str()));

    Ok(match last {
        Some(workout) => Json(workout).into_response(),
        None => MessageResponse::new("No workouts found for this plan").into_response(),
    })
}

async fn exercise_history(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(exercise_id): Path<String>,
) -> Result<Json<Vec<ExerciseHistoryEntry>>> {
    if exercise_id.is_empty() || exercise_id == "undefined" {
        return Err(AppError::BadRequest(
            "Invalid exercise ID provided".to_string(),
        ));
    }
    if state.db.get_exercise(&exercise_id).await?.is_none() {
        return Err(AppError::NotFound("Exercise not found".to_string()));
    }

    let history = state
        .db
        .list_workouts_for_user(&auth.id)
        .await?
        .iter()
        .filter_map(|w| w.history_entry(&exercise_id))
        .take(HISTORY_LIMIT)
        .collect();
    Ok(Json(history))
}

async fn get_workout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Workout>> {
    Ok(Json(load_owned_workout(&state, &auth.id, &id).await?))
}

async fn update_workout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(input): Json<WorkoutInput>,
) -> Result<Json<Workout>> {
    let mut workout = load_owned_workout(&state, &auth.id, &id).await?;

    if let Some(plan) = input.plan {
        workout.plan = Some(plan).filter(|p| !p.is_empty());
    }
    if let Some(plan_name) = input.plan_name {
        workout.plan_name = plan_name;
    }
    if let Some(exercises) = input.exercises {
        workout.exercises = exercises;
    }
    if let Some(start_time) = input.start_time {
        workout.start_time = start_time;
    }
    if let Some(end_time) = input.end_time {
        workout.end_time = end_time;
    }
    if let Some(total_pause_time) = input.total_pause_time {
        workout.total_pause_time = total_pause_time;
    }
    if let Some(skipped_pauses) = input.skipped_pauses {
        workout.skipped_pauses = skipped_pauses;
    }
    if let Some(progression) = input.progression {
        workout.progression = progression;
    }
    workout.updated_at = Utc::now();

    state.db.save_workout(&workout).await?;
    Ok(Json(workout))
}

async fn delete_workout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let workout = load_owned_workout(&state, &auth.id, &id).await?;
    state.db.delete_workout(&workout.id).await?;
    Ok(MessageResponse::new("Workout deleted successfully"))
}

// ─── In-progress session ─────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSetInput {
    #[serde(default)]
    weight: Option<f64>,
    #[serde(default)]
    reps: Option<f64>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    intensity: Option<f64>,
    #[serde(default)]
    incline: Option<f64>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    skipped_rest: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseProgressInput {
    exercise: String,
    #[serde(default)]
    sets: Vec<ProgressSetInput>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    required_sets: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressInput {
    #[serde(default)]
    plan: Option<String>,
    #[serde(default)]
    exercises: Vec<ExerciseProgressInput>,
    #[serde(default)]
    current_exercise_index: u32,
    #[serde(default)]
    last_set_values: Option<serde_json::Value>,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    total_pause_time: f64,
    #[serde(default)]
    skipped_pauses: u32,
    #[serde(default)]
    notes: Vec<String>,
    /// Version the client last read, for optimistic concurrency
    #[serde(default, alias = "__v")]
    version: Option<u32>,
}

impl ProgressInput {
    /// Build the stored session. Unstamped sets are stamped now and the
    /// set tally is derived from the exercise state.
    fn into_progress(
        self,
        user_id: &str,
        existing_start: Option<DateTime<Utc>>,
    ) -> Result<WorkoutProgress> {
        let plan = self
            .plan
            .filter(|p| !p.is_empty())
            .ok_or_else(|| AppError::Validation(vec!["Plan is required".to_string()]))?;

        let now = Utc::now();
        let exercises = self
            .exercises
            .into_iter()
            .map(|ex| ExerciseProgress {
                exercise: ex.exercise,
                sets: ex
                    .sets
                    .into_iter()
                    .map(|s| ProgressSet {
                        weight: s.weight,
                        reps: s.reps,
                        duration: s.duration,
                        distance: s.distance,
                        intensity: s.intensity,
                        incline: s.incline,
                        completed_at: s.completed_at.unwrap_or(now),
                        skipped_rest: s.skipped_rest,
                    })
                    .collect(),
                notes: ex.notes,
                required_sets: ex.required_sets.unwrap_or(3),
            })
            .collect();

        let mut progress = WorkoutProgress {
            user: user_id.to_string(),
            plan,
            exercises,
            current_exercise_index: self.current_exercise_index,
            start_time: self.start_time.or(existing_start).unwrap_or(now),
            last_updated: now,
            total_pause_time: self.total_pause_time,
            skipped_pauses: self.skipped_pauses,
            last_set_values: self.last_set_values,
            completed_sets: 0,
            total_sets: 0,
            notes: self.notes,
            version: 0,
        };
        progress.recompute_tally();
        progress.clamp_index();
        Ok(progress)
    }
}

#[derive(Serialize)]
pub struct ProgressResponse {
    pub message: String,
    pub progress: WorkoutProgress,
}

async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Option<WorkoutProgress>>> {
    Ok(Json(state.db.get_progress(&auth.id).await?))
}

/// Upsert the session. A supplied `version` must match the stored one.
async fn save_progress(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<ProgressInput>,
) -> Result<Json<ProgressResponse>> {
    let expected = input.version;
    let existing_start = state
        .db
        .get_progress(&auth.id)
        .await?
        .map(|p| p.start_time);
    let progress = input.into_progress(&auth.id, existing_start)?;

    let saved = state.db.save_progress(progress, expected).await?;
    Ok(Json(ProgressResponse {
        message: "Progress saved successfully".to_string(),
        progress: saved,
    }))
}

/// Start a fresh session, discarding any existing one.
async fn new_progress(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<ProgressInput>,
) -> Result<(StatusCode, Json<ProgressResponse>)> {
    let progress = input.into_progress(&auth.id, None)?;
    state.db.delete_progress(&auth.id).await?;
    let saved = state.db.save_progress(progress, None).await?;

    tracing::info!(user_id = %auth.id, plan_id = %saved.plan, "Workout session started");
    Ok((
        StatusCode::CREATED,
        Json(ProgressResponse {
            message: "New progress created successfully".to_string(),
            progress: saved,
        }),
    ))
}

async fn clear_progress(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<MessageResponse>> {
    state.db.delete_progress(&auth.id).await?;
    Ok(MessageResponse::new("Workout progress cleared successfully"))
}
