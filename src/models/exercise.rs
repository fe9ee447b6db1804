// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exercise catalog model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::user::ExperienceLevel;

pub const DEFAULT_IMAGE_URL: &str =
    "https://www.inspireusafoundation.org/wp-content/uploads/2023/03/barbell-bench-press-side-view.gif";

/// Exercise category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExerciseCategory {
    #[default]
    Strength,
    Cardio,
    Flexibility,
}

impl ExerciseCategory {
    /// `(exerciseType, measurementType)` derived for personal exercises.
    pub fn kinds(self) -> (&'static str, &'static str) {
        match self {
            ExerciseCategory::Strength => ("strength", "weight_reps"),
            ExerciseCategory::Cardio => ("cardio", "duration"),
            ExerciseCategory::Flexibility => ("strength", "duration"),
        }
    }
}

/// Suggested training parameters. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incline: Option<f64>,
}

impl Recommendation {
    /// Overwrite fields that are set in `other`.
    pub fn merge_from(&mut self, other: &Recommendation) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(weight, reps, sets, duration, distance, intensity, incline);
    }

    pub fn is_empty(&self) -> bool {
        *self == Recommendation::default()
    }
}

/// Recommendations keyed by experience level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beginner: Option<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intermediate: Option<Recommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advanced: Option<Recommendation>,
}

impl Recommendations {
    pub fn get(&self, level: ExperienceLevel) -> Option<&Recommendation> {
        match level {
            ExperienceLevel::Beginner => self.beginner.as_ref(),
            ExperienceLevel::Intermediate => self.intermediate.as_ref(),
            ExperienceLevel::Advanced => self.advanced.as_ref(),
        }
    }

    pub fn set(&mut self, level: ExperienceLevel, rec: Option<Recommendation>) {
        match level {
            ExperienceLevel::Beginner => self.beginner = rec,
            ExperienceLevel::Intermediate => self.intermediate = rec,
            ExperienceLevel::Advanced => self.advanced = rec,
        }
    }

    /// Only the entry for `level`.
    pub fn only(level: ExperienceLevel, rec: Option<Recommendation>) -> Self {
        let mut recs = Self::default();
        recs.set(level, rec);
        recs
    }
}

/// Provenance of an imported exercise or plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedFrom {
    /// Original owner (None for admin-owned default plans)
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    pub import_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_id: Option<String>,
}

/// Exercise stored in the `exercises` collection.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    #[validate(length(
        min = 1,
        max = 50,
        message = "Exercise name is required and cannot be more than 50 characters"
    ))]
    pub name: String,
    #[validate(length(
        min = 1,
        max = 500,
        message = "Exercise description is required and cannot be more than 500 characters"
    ))]
    pub description: String,
    #[validate(length(
        min = 1,
        message = "At least one target muscle group must be specified"
    ))]
    pub target: Vec<String>,
    pub image_url: String,
    #[serde(default)]
    pub category: ExerciseCategory,
    pub exercise_type: String,
    pub measurement_type: String,
    #[serde(default)]
    pub recommendations: Recommendations,
    /// Owner; None for default exercises
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_from: Option<ImportedFrom>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Archive record written whenever a user deletes (or hides) an exercise.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedExercise {
    pub id: String,
    pub exercise_id: String,
    pub exercise_data: Exercise,
    pub deleted_by: String,
    pub deleted_at: DateTime<Utc>,
    #[serde(default)]
    pub is_default: bool,
    /// Whether the underlying record was removed (vs. hidden for one user)
    #[serde(default)]
    pub removed: bool,
}
