// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! [`Store`] is the persistence seam. [`FirestoreDb`] backs production,
//! [`MemoryDb`] backs local development and the test suite.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{
    BlacklistEntry, DeletedExercise, Exercise, User, Workout, WorkoutPlan, WorkoutProgress,
};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Blacklisted tokens (keyed by SHA-256 of the token, TTL on `expires_at`)
    pub const TOKEN_BLACKLIST: &str = "token_blacklist";
    pub const EXERCISES: &str = "exercises";
    pub const DELETED_EXERCISES: &str = "deleted_exercises";
    pub const WORKOUT_PLANS: &str = "workout_plans";
    pub const WORKOUTS: &str = "workouts";
    /// In-progress sessions (keyed by user ID)
    pub const WORKOUT_PROGRESS: &str = "workout_progress";
}

/// In-place change to a stored user, applied by [`Store::update_user`].
pub type UserEdit<'a> = dyn Fn(&mut User) + Send + Sync + 'a;

/// Result of an attempted refresh-token rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// Old token removed, new token recorded, old token blacklisted.
    Rotated,
    /// The presented token is not in the ledger (already rotated, logged
    /// out, or superseded by a later login). Nothing was written.
    NotActive,
    /// The owning user no longer exists.
    UserMissing,
}

/// Typed persistence operations.
///
/// Ledger transitions (`start_session`, `rotate_refresh_token`,
/// `revoke_refresh_token`) and [`Store::update_user`] are atomic per call.
/// `update_user` never writes the ledger, so a profile edit cannot
/// resurrect a rotated token.
#[async_trait]
pub trait Store: Send + Sync {
    // ─── Users ───────────────────────────────────────────────────

    /// Insert a new user. Duplicate username or email is a `Conflict`.
    async fn create_user(&self, user: &User) -> Result<(), AppError>;

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Apply `edit` to the stored user and persist the fields in
    /// [`User::PROFILE_FIELDS`], as one read-modify-write.
    ///
    /// `edit` runs against the current stored state and may run more than
    /// once if a concurrent writer forces a retry. Changes it makes to the
    /// ledger are discarded. Returns the updated user, or `None` if the
    /// user does not exist.
    async fn update_user(
        &self,
        user_id: &str,
        edit: &UserEdit<'_>,
    ) -> Result<Option<User>, AppError>;

    /// Replace the user's ledger with exactly `refresh_token`.
    ///
    /// Returns `false` if the user does not exist.
    async fn start_session(&self, user_id: &str, refresh_token: &str) -> Result<bool, AppError>;

    /// Atomically swap `old_token` for `new_token` in the ledger and
    /// blacklist the old token.
    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        old_token: &str,
        new_token: &str,
        old_token_entry: &BlacklistEntry,
    ) -> Result<RotationOutcome, AppError>;

    /// Remove a token from the ledger if present.
    async fn revoke_refresh_token(&self, user_id: &str, token: &str) -> Result<(), AppError>;

    /// Delete the user together with their exercises, plans, workouts and
    /// in-progress session. Returns the number of documents removed.
    async fn delete_user_cascade(&self, user_id: &str) -> Result<usize, AppError>;

    // ─── Token blacklist ─────────────────────────────────────────

    async fn blacklist_token(&self, entry: &BlacklistEntry) -> Result<(), AppError>;

    /// Whether an unexpired blacklist entry exists for this token hash.
    async fn is_blacklisted(&self, token_hash: &str) -> Result<bool, AppError>;

    // ─── Exercises ───────────────────────────────────────────────

    async fn get_exercise(&self, exercise_id: &str) -> Result<Option<Exercise>, AppError>;

    /// Fetch several exercises, preserving the order of `ids`. Missing IDs
    /// are skipped.
    async fn get_exercises(&self, ids: &[String]) -> Result<Vec<Exercise>, AppError>;

    /// Exercises owned by `user_id` plus all default exercises.
    async fn list_exercises_for_user(&self, user_id: &str) -> Result<Vec<Exercise>, AppError>;

    async fn save_exercise(&self, exercise: &Exercise) -> Result<(), AppError>;

    async fn delete_exercise(&self, exercise_id: &str) -> Result<(), AppError>;

    async fn archive_exercise(&self, record: &DeletedExercise) -> Result<(), AppError>;

    async fn get_deleted_exercise(&self, id: &str) -> Result<Option<DeletedExercise>, AppError>;

    /// All archive records, newest first.
    async fn list_deleted_exercises(&self) -> Result<Vec<DeletedExercise>, AppError>;

    async fn remove_deleted_exercise(&self, id: &str) -> Result<(), AppError>;

    // ─── Workout plans ───────────────────────────────────────────

    async fn get_plan(&self, plan_id: &str) -> Result<Option<WorkoutPlan>, AppError>;

    async fn find_plan_by_share_id(&self, share_id: &str)
        -> Result<Option<WorkoutPlan>, AppError>;

    /// Plans owned by `user_id` plus all default plans.
    async fn list_plans_for_user(&self, user_id: &str) -> Result<Vec<WorkoutPlan>, AppError>;

    async fn save_plan(&self, plan: &WorkoutPlan) -> Result<(), AppError>;

    async fn delete_plan(&self, plan_id: &str) -> Result<(), AppError>;

    /// Persist an imported plan and its newly copied exercises in one
    /// atomic write.
    async fn import_plan(
        &self,
        plan: &WorkoutPlan,
        new_exercises: &[Exercise],
    ) -> Result<(), AppError>;

    /// Clear the plan reference of every workout logged against `plan_id`
    /// and flag it `plan_deleted`. Returns the number of workouts touched.
    async fn detach_workouts_from_plan(&self, plan_id: &str) -> Result<usize, AppError>;

    // ─── Workouts ────────────────────────────────────────────────

    async fn get_workout(&self, workout_id: &str) -> Result<Option<Workout>, AppError>;

    /// The user's workouts, newest `start_time` first.
    async fn list_workouts_for_user(&self, user_id: &str) -> Result<Vec<Workout>, AppError>;

    async fn save_workout(&self, workout: &Workout) -> Result<(), AppError>;

    async fn delete_workout(&self, workout_id: &str) -> Result<(), AppError>;

    // ─── Workout progress ────────────────────────────────────────

    async fn get_progress(&self, user_id: &str) -> Result<Option<WorkoutProgress>, AppError>;

    /// Upsert the user's session.
    ///
    /// With `expected_version`, the write only succeeds if the stored
    /// version matches (`StaleWrite` otherwise). The stored version is
    /// bumped on every write; the persisted record is returned.
    async fn save_progress(
        &self,
        progress: WorkoutProgress,
        expected_version: Option<u32>,
    ) -> Result<WorkoutProgress, AppError>;

    async fn delete_progress(&self, user_id: &str) -> Result<(), AppError>;
}

/// Next stored version for a progress write, enforcing `expected`.
pub(crate) fn next_progress_version(
    current: Option<&WorkoutProgress>,
    expected: Option<u32>,
) -> Result<u32, AppError> {
    let stored = current.map(|p| p.version);
    if let Some(expected) = expected {
        if stored.unwrap_or(0) != expected {
            return Err(AppError::StaleWrite(
                "Data is out of sync. Please refresh and try again.".to_string(),
            ));
        }
    }
    Ok(stored.map(|v| v.wrapping_add(1)).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_progress_version() {
        assert_eq!(next_progress_version(None, None).unwrap(), 0);
        assert_eq!(next_progress_version(None, Some(0)).unwrap(), 0);
        assert!(matches!(
            next_progress_version(None, Some(3)),
            Err(AppError::StaleWrite(_))
        ));
    }
}
