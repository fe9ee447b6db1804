// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout plan routes under `/api/workoutplans`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::{current_user, edit_user, require_admin, MessageResponse};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::exercise::ImportedFrom;
use crate::models::{Exercise, PlanType, PlanView, User, WorkoutPlan};
use crate::services::entitlements::{can_delete, can_edit, can_view, DeleteAction};
use crate::services::Viewer;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/workoutplans", get(list_plans).post(create_plan))
        .route("/api/workoutplans/default", post(create_default_plan))
        .route("/api/workoutplans/import/{share_id}", post(import_plan))
        .route(
            "/api/workoutplans/{id}",
            get(get_plan).put(update_plan).delete(delete_plan),
        )
        .route("/api/workoutplans/{id}/exercises", post(add_exercise))
        .route(
            "/api/workoutplans/{id}/exercises/{exercise_id}",
            delete(remove_exercise),
        )
        .route("/api/workoutplans/{id}/share", post(share_plan))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInput {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    exercises: Option<Vec<String>>,
    #[serde(default)]
    scheduled_date: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    plan_type: Option<PlanType>,
    #[serde(default)]
    is_default: bool,
}

impl PlanInput {
    fn name(&self) -> Result<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation(vec!["Workout plan name is required".to_string()]))
    }

    fn apply_to(self, plan: &mut WorkoutPlan) {
        if let Some(exercises) = self.exercises {
            plan.exercises = exercises;
        }
        if self.scheduled_date.is_some() {
            plan.scheduled_date = self.scheduled_date;
        }
        if let Some(plan_type) = self.plan_type {
            plan.plan_type = plan_type;
        }
        plan.updated_at = Utc::now();
    }
}

#[derive(Serialize)]
pub struct PlanList {
    pub plans: Vec<PlanView>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareResponse {
    pub share_link: String,
    pub plan: PlanView,
}

fn plan_not_found() -> AppError {
    AppError::NotFound("Workout plan not found".to_string())
}

async fn load_plan(state: &AppState, id: &str) -> Result<WorkoutPlan> {
    state.db.get_plan(id).await?.ok_or_else(plan_not_found)
}

async fn populate(state: &AppState, plan: WorkoutPlan) -> Result<PlanView> {
    let exercises = state.db.get_exercises(&plan.exercises).await?;
    Ok(PlanView::new(plan, exercises))
}

/// Another plan visible to `user` (own or default) already named `name`.
async fn plan_named(
    state: &AppState,
    user: &User,
    name: &str,
    except_id: Option<&str>,
) -> Result<Option<WorkoutPlan>> {
    Ok(state
        .db
        .list_plans_for_user(&user.id)
        .await?
        .into_iter()
        .find(|p| p.name == name && Some(p.id.as_str()) != except_id))
}

fn duplicate_name() -> AppError {
    AppError::Conflict("A workout plan with this name already exists".to_string())
}

// ─── Listing and lookup ──────────────────────────────────────

async fn list_plans(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<PlanList>> {
    let user = current_user(&state, &auth.id).await?;
    let viewer = Viewer::for_plans(&user);

    let visible: Vec<WorkoutPlan> = state
        .db
        .list_plans_for_user(&user.id)
        .await?
        .into_iter()
        .filter(|p| viewer.sees(p))
        .collect();

    let mut plans = Vec::with_capacity(visible.len());
    for plan in visible {
        plans.push(populate(&state, plan).await?);
    }
    Ok(Json(PlanList { plans }))
}

async fn get_plan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<PlanView>> {
    let plan = load_plan(&state, &id).await?;
    let user = current_user(&state, &auth.id).await?;
    can_view(&Viewer::for_plans(&user), &plan)?;
    Ok(Json(populate(&state, plan).await?))
}

// ─── Create and update ───────────────────────────────────────

/// Create a plan, or update in place the caller's existing plan of the
/// same name.
async fn create_plan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<PlanInput>,
) -> Result<(StatusCode, Json<PlanView>)> {
    let name = input.name()?;
    let user = current_user(&state, &auth.id).await?;

    if let Some(mut existing) = plan_named(&state, &user, &name, None).await? {
        can_edit(&Viewer::for_plans(&user), &existing).map_err(|_| duplicate_name())?;
        input.apply_to(&mut existing);
        state.db.save_plan(&existing).await?;
        return Ok((StatusCode::OK, Json(populate(&state, existing).await?)));
    }

    let make_default = user.is_admin && input.is_default;
    let owner = (!make_default).then(|| user.id.clone());
    let mut plan = WorkoutPlan::new(&name, owner, make_default);
    input.apply_to(&mut plan);
    state.db.save_plan(&plan).await?;

    tracing::info!(user_id = %user.id, plan_id = %plan.id, "Workout plan created");
    Ok((StatusCode::CREATED, Json(populate(&state, plan).await?)))
}

async fn create_default_plan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(input): Json<PlanInput>,
) -> Result<(StatusCode, Json<PlanView>)> {
    require_admin(&auth)?;
    let name = input.name()?;
    if input.exercises.is_none() {
        return Err(AppError::BadRequest("Invalid workout plan data".to_string()));
    }

    let user = current_user(&state, &auth.id).await?;
    if plan_named(&state, &user, &name, None).await?.is_some() {
        return Err(duplicate_name());
    }

    let mut plan = WorkoutPlan::new(&name, None, true);
    input.apply_to(&mut plan);
    state.db.save_plan(&plan).await?;

    tracing::info!(plan_id = %plan.id, "Default workout plan created");
    Ok((StatusCode::CREATED, Json(populate(&state, plan).await?)))
}

async fn update_plan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(input): Json<PlanInput>,
) -> Result<Json<PlanView>> {
    let mut plan = load_plan(&state, &id).await?;
    let user = current_user(&state, &auth.id).await?;
    can_edit(&Viewer::for_plans(&user), &plan)?;

    if input.name.is_some() {
        let name = input.name()?;
        if name != plan.name {
            if plan_named(&state, &user, &name, Some(&plan.id)).await?.is_some() {
                return Err(duplicate_name());
            }
            plan.name = name;
        }
    }

    input.apply_to(&mut plan);
    state.db.save_plan(&plan).await?;
    Ok(Json(populate(&state, plan).await?))
}

// ─── Plan exercises ──────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddExerciseRequest {
    #[serde(default)]
    exercise_id: Option<String>,
}

async fn add_exercise(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<AddExerciseRequest>,
) -> Result<Json<PlanView>> {
    let exercise_id = body
        .exercise_id
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::BadRequest("Exercise ID is required".to_string()))?;

    let user = current_user(&state, &auth.id).await?;
    let exercise = state
        .db
        .get_exercise(&exercise_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exercise not found".to_string()))?;
    can_view(&Viewer::for_exercises(&user), &exercise)?;

    let mut plan = load_plan(&state, &id).await?;
    can_edit(&Viewer::for_plans(&user), &plan)?;

    if plan.exercises.contains(&exercise_id) {
        return Err(AppError::BadRequest(
            "Exercise already in the workout plan".to_string(),
        ));
    }
    plan.exercises.push(exercise_id);
    plan.updated_at = Utc::now();
    state.db.save_plan(&plan).await?;
    Ok(Json(populate(&state, plan).await?))
}

async fn remove_exercise(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((id, exercise_id)): Path<(String, String)>,
) -> Result<Json<PlanView>> {
    let mut plan = load_plan(&state, &id).await?;
    let user = current_user(&state, &auth.id).await?;
    can_edit(&Viewer::for_plans(&user), &plan)?;

    let Some(idx) = plan.exercises.iter().position(|e| *e == exercise_id) else {
        return Err(AppError::NotFound(
            "Exercise not found in the workout plan".to_string(),
        ));
    };
    plan.exercises.remove(idx);
    plan.updated_at = Utc::now();
    state.db.save_plan(&plan).await?;
    Ok(Json(populate(&state, plan).await?))
}

// ─── Delete ──────────────────────────────────────────────────

async fn delete_plan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let plan = load_plan(&state, &id).await?;
    let user = current_user(&state, &auth.id).await?;
    let action = can_delete(&Viewer::for_plans(&user), &plan)?;

    match action {
        DeleteAction::Remove => {
            state.db.delete_plan(&plan.id).await?;
            let detached = state.db.detach_workouts_from_plan(&plan.id).await?;
            tracing::info!(
                user_id = %user.id,
                plan_id = %plan.id,
                detached,
                "Workout plan deleted"
            );
            Ok(MessageResponse::new("Workout plan deleted successfully"))
        }
        DeleteAction::Hide => {
            edit_user(&state, &user.id, &|u: &mut User| {
                u.deleted_workout_plans.insert(plan.id.clone());
            })
            .await?;
            Ok(MessageResponse::new("Workout plan removed from your view"))
        }
    }
}

// ─── Sharing ─────────────────────────────────────────────────

async fn share_plan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ShareResponse>> {
    let mut plan = load_plan(&state, &id).await?;
    let user = current_user(&state, &auth.id).await?;
    can_view(&Viewer::for_plans(&user), &plan)?;

    if plan.is_default && !user.is_admin {
        return Err(AppError::Forbidden(
            "You do not have permission to share this plan".to_string(),
        ));
    }

    plan.ensure_shared()
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate share ID")))?;
    state.db.save_plan(&plan).await?;

    let share_link = plan
        .share_link(&state.config.frontend_url)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Shared plan has no share ID")))?;
    tracing::info!(user_id = %user.id, plan_id = %plan.id, "Workout plan shared");

    Ok(Json(ShareResponse {
        share_link,
        plan: populate(&state, plan).await?,
    }))
}

/// Deep-copy a shared plan for the caller.
///
/// The caller must not already see a plan with the same name.
/// Exercises the caller can already see under the same name are reused;
/// the rest become personal copies tagged with their provenance. The new
/// plan and copies are written in one atomic operation.
async fn import_plan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(share_id): Path<String>,
) -> Result<(StatusCode, Json<PlanView>)> {
    let shared = state
        .db
        .find_plan_by_share_id(&share_id)
        .await?
        .filter(|p| p.is_shared)
        .ok_or_else(|| AppError::NotFound("Shared workout plan not found".to_string()))?;

    let importer = current_user(&state, &auth.id).await?;
    if plan_named(&state, &importer, &shared.name, None)
        .await?
        .is_some()
    {
        return Err(duplicate_name());
    }
    let owner_username = match &shared.user {
        Some(owner_id) => state.db.get_user(owner_id).await?.map(|u| u.username),
        None => None,
    };

    let viewer = Viewer::for_exercises(&importer);
    let mut by_name: HashMap<String, String> = state
        .db
        .list_exercises_for_user(&importer.id)
        .await?
        .into_iter()
        .filter(|e| viewer.sees(e))
        .map(|e| (e.name, e.id))
        .collect();

    let now = Utc::now();
    let mut copies: Vec<Exercise> = Vec::new();
    let mut exercise_ids = Vec::with_capacity(shared.exercises.len());
    for source in state.db.get_exercises(&shared.exercises).await? {
        if let Some(existing) = by_name.get(&source.name) {
            exercise_ids.push(existing.clone());
            continue;
        }
        let copy = Exercise {
            id: uuid::Uuid::new_v4().to_string(),
            user: Some(importer.id.clone()),
            is_default: false,
            imported_from: Some(ImportedFrom {
                user: shared.user.clone(),
                username: owner_username.clone(),
                import_date: now,
                share_id: shared.share_id.clone(),
            }),
            created_at: now,
            updated_at: now,
            ..source
        };
        by_name.insert(copy.name.clone(), copy.id.clone());
        exercise_ids.push(copy.id.clone());
        copies.push(copy);
    }

    let plan = shared.import_copy(&importer.id, owner_username, exercise_ids);
    state.db.import_plan(&plan, &copies).await?;

    tracing::info!(
        user_id = %importer.id,
        plan_id = %plan.id,
        copied = copies.len(),
        "Workout plan imported"
    );
    Ok((StatusCode::CREATED, Json(populate(&state, plan).await?)))
}
