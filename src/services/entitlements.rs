// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Who may see, change or delete an exercise or workout plan.
//!
//! Rules, first match wins:
//! 1. Admins may do anything.
//! 2. A personal resource belongs to its owner alone. Everyone else gets
//!    `NotFound`, so IDs of other users' resources are not confirmed.
//! 3. A default resource is visible to every user who has not hidden it.
//!    Only admins change it; a user's delete hides it for that user only.

use crate::error::AppError;
use crate::models::user::UserExercise;
use crate::models::{Exercise, ExperienceLevel, Recommendations, User, WorkoutPlan};
use serde::Serialize;
use std::collections::BTreeSet;

/// A resource that is either personal or a shared default.
pub trait Owned {
    fn id(&self) -> &str;
    fn owner(&self) -> Option<&str>;
    fn is_default(&self) -> bool;

    /// Human readable kind for error messages.
    const KIND: &'static str;
}

impl Owned for Exercise {
    const KIND: &'static str = "Exercise";

    fn id(&self) -> &str {
        &self.id
    }
    fn owner(&self) -> Option<&str> {
        self.user.as_deref()
    }
    fn is_default(&self) -> bool {
        self.is_default
    }
}

impl Owned for WorkoutPlan {
    const KIND: &'static str = "Workout plan";

    fn id(&self) -> &str {
        &self.id
    }
    fn owner(&self) -> Option<&str> {
        self.user.as_deref()
    }
    fn is_default(&self) -> bool {
        self.is_default
    }
}

/// The requesting user, seen through one resource kind's deletion set.
#[derive(Debug, Clone, Copy)]
pub struct Viewer<'a> {
    pub user_id: &'a str,
    pub is_admin: bool,
    hidden: &'a BTreeSet<String>,
}

impl<'a> Viewer<'a> {
    pub fn for_exercises(user: &'a User) -> Self {
        Self {
            user_id: &user.id,
            is_admin: user.is_admin,
            hidden: &user.deleted_exercises,
        }
    }

    pub fn for_plans(user: &'a User) -> Self {
        Self {
            user_id: &user.id,
            is_admin: user.is_admin,
            hidden: &user.deleted_workout_plans,
        }
    }

    fn owns<R: Owned>(&self, resource: &R) -> bool {
        !resource.is_default() && resource.owner() == Some(self.user_id)
    }

    /// Whether the resource shows up in this viewer's listings.
    pub fn sees<R: Owned>(&self, resource: &R) -> bool {
        if resource.is_default() {
            return !self.hidden.contains(resource.id());
        }
        self.owns(resource)
    }
}

/// How an edit request is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    /// Write the shared record.
    Update,
    /// Write the viewer's personal overlay instead.
    Overlay,
}

/// How a delete request is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteAction {
    /// Delete the record for everyone.
    Remove,
    /// Add the ID to the viewer's deletion set.
    Hide,
}

fn not_found<R: Owned>() -> AppError {
    AppError::NotFound(format!("{} not found", R::KIND))
}

pub fn can_view<R: Owned>(viewer: &Viewer<'_>, resource: &R) -> Result<(), AppError> {
    if viewer.is_admin || viewer.sees(resource) {
        Ok(())
    } else {
        Err(not_found::<R>())
    }
}

pub fn can_edit<R: Owned>(viewer: &Viewer<'_>, resource: &R) -> Result<(), AppError> {
    can_view(viewer, resource)?;
    if viewer.is_admin || viewer.owns(resource) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to edit this resource".to_string(),
        ))
    }
}

/// Edit resolution for resources that support per-user overlays.
pub fn edit_action<R: Owned>(viewer: &Viewer<'_>, resource: &R) -> Result<EditAction, AppError> {
    match can_edit(viewer, resource) {
        Ok(()) => Ok(EditAction::Update),
        Err(AppError::Forbidden(_)) if resource.is_default() => Ok(EditAction::Overlay),
        Err(e) => Err(e),
    }
}

pub fn can_delete<R: Owned>(viewer: &Viewer<'_>, resource: &R) -> Result<DeleteAction, AppError> {
    can_view(viewer, resource)?;
    if viewer.is_admin || viewer.owns(resource) {
        Ok(DeleteAction::Remove)
    } else if resource.is_default() {
        Ok(DeleteAction::Hide)
    } else {
        Err(not_found::<R>())
    }
}

// ─── Overlay merge ───────────────────────────────────────────

fn pick_str(overlay: &Option<String>, base: &mut String) {
    if let Some(value) = overlay.as_ref().filter(|v| !v.is_empty()) {
        base.clone_from(value);
    }
}

/// Apply a user's overlay to an exercise.
///
/// Overlay fields win when present and non-empty. With an overlay, only
/// the recommendation for `level` is reported: the overlay's own, falling
/// back to the base entry for that level.
pub fn merge_overlay(
    mut exercise: Exercise,
    overlay: Option<&UserExercise>,
    level: ExperienceLevel,
) -> Exercise {
    let Some(overlay) = overlay else {
        return exercise;
    };

    pick_str(&overlay.name, &mut exercise.name);
    pick_str(&overlay.description, &mut exercise.description);
    pick_str(&overlay.image_url, &mut exercise.image_url);
    if let Some(target) = overlay.target.as_ref().filter(|t| !t.is_empty()) {
        exercise.target.clone_from(target);
    }

    let rec = overlay
        .recommendation
        .clone()
        .or_else(|| exercise.recommendations.get(level).cloned());
    exercise.recommendations = Recommendations::only(level, rec);
    exercise
}

/// Exercise as presented to one user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseView {
    #[serde(flatten)]
    pub exercise: Exercise,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_recommendations: Option<Recommendations>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_user_specific: bool,
}

impl ExerciseView {
    /// Listing form: overlay merged, nothing else added.
    pub fn summary(exercise: Exercise, user: &User) -> Self {
        let overlay = user.overlay(&exercise.id);
        let has_overlay = overlay.is_some();
        let merged = merge_overlay(exercise, overlay, user.experience_level);
        Self {
            exercise: merged,
            base_recommendations: None,
            is_user_specific: has_overlay,
        }
    }

    /// Detail form: recommendations narrowed to the user's level, plus
    /// the full base recommendations for reference.
    pub fn detail(exercise: Exercise, user: &User) -> Self {
        let base = exercise.recommendations.clone();
        let level = user.experience_level;
        let overlay = user.overlay(&exercise.id);
        let has_overlay = overlay.is_some();

        let mut merged = merge_overlay(exercise, overlay, level);
        if !has_overlay {
            let rec = merged.recommendations.get(level).cloned();
            merged.recommendations = Recommendations::only(level, rec);
        }

        Self {
            exercise: merged,
            base_recommendations: Some(base),
            is_user_specific: has_overlay,
        }
    }
}
