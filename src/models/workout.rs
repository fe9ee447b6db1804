// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Logged workouts and the resumable in-progress session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed set in a logged workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSet {
    pub weight: f64,
    pub reps: f64,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub skipped_rest: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutExercise {
    /// Exercise ID
    pub exercise: String,
    #[serde(default)]
    pub sets: Vec<WorkoutSet>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
}

/// Finalized workout stored in the `workouts` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    pub id: String,
    pub user: String,
    #[serde(default)]
    pub plan: Option<String>,
    pub plan_name: String,
    /// Set once the originating plan has been removed
    #[serde(default)]
    pub plan_deleted: bool,
    pub exercises: Vec<WorkoutExercise>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub total_pause_time: f64,
    #[serde(default)]
    pub skipped_pauses: u32,
    #[serde(default)]
    pub progression: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workout {
    /// Sets and notes recorded for one exercise in this workout.
    pub fn history_entry(&self, exercise_id: &str) -> Option<ExerciseHistoryEntry> {
        self.exercises
            .iter()
            .find(|e| e.exercise == exercise_id)
            .map(|e| ExerciseHistoryEntry {
                date: self.start_time,
                sets: e.sets.clone(),
                notes: e.notes.clone(),
            })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseHistoryEntry {
    pub date: DateTime<Utc>,
    pub sets: Vec<WorkoutSet>,
    pub notes: String,
}

// ─── In-progress session ─────────────────────────────────────

/// A set recorded during an in-progress session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSet {
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub reps: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub intensity: Option<f64>,
    #[serde(default)]
    pub incline: Option<f64>,
    pub completed_at: DateTime<Utc>,
    #[serde(default)]
    pub skipped_rest: bool,
}

fn default_required_sets() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseProgress {
    pub exercise: String,
    #[serde(default)]
    pub sets: Vec<ProgressSet>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default = "default_required_sets")]
    pub required_sets: u32,
}

/// The single active, resumable session of a user (`workout_progress`,
/// keyed by user ID).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutProgress {
    pub user: String,
    pub plan: String,
    #[serde(default)]
    pub exercises: Vec<ExerciseProgress>,
    #[serde(default)]
    pub current_exercise_index: u32,
    pub start_time: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub total_pause_time: f64,
    #[serde(default)]
    pub skipped_pauses: u32,
    #[serde(default)]
    pub last_set_values: Option<serde_json::Value>,
    #[serde(default)]
    pub completed_sets: u32,
    #[serde(default)]
    pub total_sets: u32,
    #[serde(default)]
    pub notes: Vec<String>,
    /// Optimistic concurrency counter, bumped on every write
    #[serde(default)]
    pub version: u32,
}

impl WorkoutProgress {
    /// Recompute the completed/total set tally from the exercise state.
    ///
    /// An exercise contributes `max(required_sets, recorded sets)` to the
    /// total, so over-achieving never yields completed > total.
    pub fn recompute_tally(&mut self) {
        let (completed, total) = self.exercises.iter().fold((0u32, 0u32), |(c, t), ex| {
            let done = u32::try_from(ex.sets.len()).unwrap_or(u32::MAX);
            (
                c.saturating_add(done),
                t.saturating_add(ex.required_sets.max(done)),
            )
        });
        self.completed_sets = completed;
        self.total_sets = total;
    }

    /// Current exercise index clamped into range.
    pub fn clamp_index(&mut self) {
        let len = self.exercises.len() as u32;
        if len == 0 {
            self.current_exercise_index = 0;
        } else if self.current_exercise_index >= len {
            self.current_exercise_index = len - 1;
        }
    }
}
