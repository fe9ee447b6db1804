// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store backed by `DashMap`.
//!
//! Ledger transitions and user edits run while holding the user entry's
//! exclusive shard lock, which gives the same all-or-nothing behavior as a Firestore
//! transaction.

use crate::db::{next_progress_version, RotationOutcome, Store, UserEdit};
use crate::error::AppError;
use crate::models::{
    BlacklistEntry, DeletedExercise, Exercise, User, Workout, WorkoutPlan, WorkoutProgress,
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryDb {
    users: DashMap<String, User>,
    /// Serializes user creation so the uniqueness scan and insert are atomic.
    user_create_lock: Mutex<()>,
    blacklist: DashMap<String, BlacklistEntry>,
    exercises: DashMap<String, Exercise>,
    deleted_exercises: DashMap<String, DeletedExercise>,
    plans: DashMap<String, WorkoutPlan>,
    workouts: DashMap<String, Workout>,
    progress: DashMap<String, WorkoutProgress>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_user(&self, pred: impl Fn(&User) -> bool) -> Option<User> {
        self.users
            .iter()
            .find(|entry| pred(entry.value()))
            .map(|entry| entry.value().clone())
    }
}

#[async_trait]
impl Store for MemoryDb {
    // ─── Users ───────────────────────────────────────────────────

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let _guard = self
            .user_create_lock
            .lock()
            .map_err(|_| AppError::Database("user create lock poisoned".to_string()))?;

        let duplicate = self
            .users
            .iter()
            .any(|e| e.username == user.username || e.email == user.email);
        if duplicate {
            return Err(AppError::Conflict(
                "User with this email or username already exists".to_string(),
            ));
        }
        self.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self.find_user(|u| u.username == username))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.find_user(|u| u.email == email))
    }

    async fn update_user(
        &self,
        user_id: &str,
        edit: &UserEdit<'_>,
    ) -> Result<Option<User>, AppError> {
        let Some(mut stored) = self.users.get_mut(user_id) else {
            return Ok(None);
        };
        let ledger = std::mem::take(&mut stored.active_refresh_tokens);
        edit(stored.value_mut());
        stored.active_refresh_tokens = ledger;
        stored.updated_at = Utc::now();
        Ok(Some(stored.clone()))
    }

    async fn start_session(&self, user_id: &str, refresh_token: &str) -> Result<bool, AppError> {
        let Some(mut user) = self.users.get_mut(user_id) else {
            return Ok(false);
        };
        user.active_refresh_tokens.clear();
        user.active_refresh_tokens.add(refresh_token);
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        old_token: &str,
        new_token: &str,
        old_token_entry: &BlacklistEntry,
    ) -> Result<RotationOutcome, AppError> {
        let Some(mut user) = self.users.get_mut(user_id) else {
            return Ok(RotationOutcome::UserMissing);
        };
        if !user.active_refresh_tokens.remove(old_token) {
            return Ok(RotationOutcome::NotActive);
        }
        // Blacklist while the ledger lock is still held.
        self.blacklist
            .insert(old_token_entry.token_hash.clone(), old_token_entry.clone());
        user.active_refresh_tokens.add(new_token);
        user.updated_at = Utc::now();
        Ok(RotationOutcome::Rotated)
    }

    async fn revoke_refresh_token(&self, user_id: &str, token: &str) -> Result<(), AppError> {
        if let Some(mut user) = self.users.get_mut(user_id) {
            if user.active_refresh_tokens.remove(token) {
                user.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn delete_user_cascade(&self, user_id: &str) -> Result<usize, AppError> {
        let owned = |owner: &Option<String>| owner.as_deref() == Some(user_id);
        let mut deleted = 0;

        let before = self.exercises.len();
        self.exercises.retain(|_, e| !owned(&e.user));
        deleted += before - self.exercises.len();

        let before = self.plans.len();
        self.plans.retain(|_, p| !owned(&p.user));
        deleted += before - self.plans.len();

        let before = self.workouts.len();
        self.workouts.retain(|_, w| w.user != user_id);
        deleted += before - self.workouts.len();

        deleted += usize::from(self.progress.remove(user_id).is_some());
        deleted += usize::from(self.users.remove(user_id).is_some());

        tracing::info!(user_id, deleted, "User data deletion complete");
        Ok(deleted)
    }

    // ─── Token blacklist ─────────────────────────────────────────

    async fn blacklist_token(&self, entry: &BlacklistEntry) -> Result<(), AppError> {
        self.blacklist.insert(entry.token_hash.clone(), entry.clone());
        Ok(())
    }

    async fn is_blacklisted(&self, token_hash: &str) -> Result<bool, AppError> {
        let now = Utc::now();
        let active = match self.blacklist.get(token_hash) {
            Some(entry) => entry.is_active_at(now),
            None => return Ok(false),
        };
        if !active {
            // Lazy purge; the read guard is dropped above.
            self.blacklist
                .remove_if(token_hash, |_, entry| !entry.is_active_at(now));
        }
        Ok(active)
    }

    // ─── Exercises ───────────────────────────────────────────────

    async fn get_exercise(&self, exercise_id: &str) -> Result<Option<Exercise>, AppError> {
        Ok(self.exercises.get(exercise_id).map(|e| e.clone()))
    }

    async fn get_exercises(&self, ids: &[String]) -> Result<Vec<Exercise>, AppError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.exercises.get(id).map(|e| e.clone()))
            .collect())
    }

    async fn list_exercises_for_user(&self, user_id: &str) -> Result<Vec<Exercise>, AppError> {
        let mut exercises: Vec<Exercise> = self
            .exercises
            .iter()
            .filter(|e| e.is_default || e.user.as_deref() == Some(user_id))
            .map(|e| e.clone())
            .collect();
        exercises.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(exercises)
    }

    async fn save_exercise(&self, exercise: &Exercise) -> Result<(), AppError> {
        self.exercises.insert(exercise.id.clone(), exercise.clone());
        Ok(())
    }

    async fn delete_exercise(&self, exercise_id: &str) -> Result<(), AppError> {
        self.exercises.remove(exercise_id);
        Ok(())
    }

    async fn archive_exercise(&self, record: &DeletedExercise) -> Result<(), AppError> {
        self.deleted_exercises
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_deleted_exercise(&self, id: &str) -> Result<Option<DeletedExercise>, AppError> {
        Ok(self.deleted_exercises.get(id).map(|d| d.clone()))
    }

    async fn list_deleted_exercises(&self) -> Result<Vec<DeletedExercise>, AppError> {
        let mut records: Vec<DeletedExercise> =
            self.deleted_exercises.iter().map(|d| d.clone()).collect();
        records.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
        Ok(records)
    }

    async fn remove_deleted_exercise(&self, id: &str) -> Result<(), AppError> {
        self.deleted_exercises.remove(id);
        Ok(())
    }

    // ─── Workout plans ───────────────────────────────────────────

    async fn get_plan(&self, plan_id: &str) -> Result<Option<WorkoutPlan>, AppError> {
        Ok(self.plans.get(plan_id).map(|p| p.clone()))
    }

    async fn find_plan_by_share_id(
        &self,
        share_id: &str,
    ) -> Result<Option<WorkoutPlan>, AppError> {
        Ok(self
            .plans
            .iter()
            .find(|p| p.share_id.as_deref() == Some(share_id))
            .map(|p| p.clone()))
    }

    async fn list_plans_for_user(&self, user_id: &str) -> Result<Vec<WorkoutPlan>, AppError> {
        let mut plans: Vec<WorkoutPlan> = self
            .plans
            .iter()
            .filter(|p| p.is_default || p.user.as_deref() == Some(user_id))
            .map(|p| p.clone())
            .collect();
        plans.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(plans)
    }

    async fn save_plan(&self, plan: &WorkoutPlan) -> Result<(), AppError> {
        self.plans.insert(plan.id.clone(), plan.clone());
        Ok(())
    }

    async fn delete_plan(&self, plan_id: &str) -> Result<(), AppError> {
        self.plans.remove(plan_id);
        Ok(())
    }

    async fn import_plan(
        &self,
        plan: &WorkoutPlan,
        new_exercises: &[Exercise],
    ) -> Result<(), AppError> {
        for exercise in new_exercises {
            self.exercises.insert(exercise.id.clone(), exercise.clone());
        }
        self.plans.insert(plan.id.clone(), plan.clone());
        Ok(())
    }

    async fn detach_workouts_from_plan(&self, plan_id: &str) -> Result<usize, AppError> {
        let now = Utc::now();
        let mut touched = 0;
        for mut workout in self.workouts.iter_mut() {
            if workout.plan.as_deref() == Some(plan_id) {
                workout.plan = None;
                workout.plan_deleted = true;
                workout.updated_at = now;
                touched += 1;
            }
        }
        Ok(touched)
    }

    // ─── Workouts ────────────────────────────────────────────────

    async fn get_workout(&self, workout_id: &str) -> Result<Option<Workout>, AppError> {
        Ok(self.workouts.get(workout_id).map(|w| w.clone()))
    }

    async fn list_workouts_for_user(&self, user_id: &str) -> Result<Vec<Workout>, AppError> {
        let mut workouts: Vec<Workout> = self
            .workouts
            .iter()
            .filter(|w| w.user == user_id)
            .map(|w| w.clone())
            .collect();
        workouts.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(workouts)
    }

    async fn save_workout(&self, workout: &Workout) -> Result<(), AppError> {
        self.workouts.insert(workout.id.clone(), workout.clone());
        Ok(())
    }

    async fn delete_workout(&self, workout_id: &str) -> Result<(), AppError> {
        self.workouts.remove(workout_id);
        Ok(())
    }

    // ─── Workout progress ────────────────────────────────────────

    async fn get_progress(&self, user_id: &str) -> Result<Option<WorkoutProgress>, AppError> {
        Ok(self.progress.get(user_id).map(|p| p.clone()))
    }

    async fn save_progress(
        &self,
        mut progress: WorkoutProgress,
        expected_version: Option<u32>,
    ) -> Result<WorkoutProgress, AppError> {
        let entry = self.progress.entry(progress.user.clone());
        let current = match &entry {
            Entry::Occupied(occupied) => Some(occupied.get().clone()),
            Entry::Vacant(_) => None,
        };
        progress.version = next_progress_version(current.as_ref(), expected_version)?;
        entry.insert(progress.clone());
        Ok(progress)
    }

    async fn delete_progress(&self, user_id: &str) -> Result<(), AppError> {
        self.progress.remove(user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn user(name: &str) -> User {
        User::new(name, &format!("{}@example.com", name), "hash".to_string())
    }

    #[tokio::test]
    async fn test_create_user_rejects_duplicates() {
        let db = MemoryDb::new();
        db.create_user(&user("alice")).await.unwrap();

        let mut same_email = user("alice2");
        same_email.email = "alice@example.com".to_string();
        assert!(matches!(
            db.create_user(&same_email).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            db.create_user(&user("alice")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_user_edit_preserves_ledger() {
        let db = MemoryDb::new();
        let alice = user("alice");
        db.create_user(&alice).await.unwrap();
        db.start_session(&alice.id, "r1").await.unwrap();

        let updated = db
            .update_user(&alice.id, &|u: &mut User| {
                u.has_seen_guide = true;
                u.active_refresh_tokens.clear();
            })
            .await
            .unwrap()
            .unwrap();
        assert!(updated.has_seen_guide);

        let stored = db.get_user(&alice.id).await.unwrap().unwrap();
        assert!(stored.has_seen_guide);
        assert!(stored.active_refresh_tokens.contains("r1"));

        assert!(db
            .update_user("missing", &|u: &mut User| u.has_seen_guide = true)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_concurrent_user_edits_are_not_lost() {
        let db = std::sync::Arc::new(MemoryDb::new());
        let alice = user("alice");
        db.create_user(&alice).await.unwrap();

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let db = db.clone();
                let user_id = alice.id.clone();
                tokio::spawn(async move {
                    let hidden = format!("ex-{}", i);
                    db.update_user(&user_id, &|u: &mut User| {
                        u.deleted_exercises.insert(hidden.clone());
                    })
                    .await
                    .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let stored = db.get_user(&alice.id).await.unwrap().unwrap();
        assert_eq!(stored.deleted_exercises.len(), 16);
    }

    #[tokio::test]
    async fn test_rotation_succeeds_once() {
        let db = Arc::new(MemoryDb::new());
        let alice = user("alice");
        db.create_user(&alice).await.unwrap();
        db.start_session(&alice.id, "r1").await.unwrap();
        let entry = BlacklistEntry::new("r1", Utc::now() + Duration::days(7));

        let mut handles = Vec::new();
        for i in 0..8 {
            let db = db.clone();
            let id = alice.id.clone();
            let entry = entry.clone();
            handles.push(tokio::spawn(async move {
                db.rotate_refresh_token(&id, "r1", &format!("n{}", i), &entry)
                    .await
                    .unwrap()
            }));
        }
        let mut rotated = 0;
        for h in handles {
            if h.await.unwrap() == RotationOutcome::Rotated {
                rotated += 1;
            }
        }
        assert_eq!(rotated, 1);
        assert!(db.is_blacklisted(&entry.token_hash).await.unwrap());
        let stored = db.get_user(&alice.id).await.unwrap().unwrap();
        assert_eq!(stored.active_refresh_tokens.len(), 1);
    }

    #[tokio::test]
    async fn test_rotation_for_missing_user() {
        let db = MemoryDb::new();
        let entry = BlacklistEntry::new("r1", Utc::now() + Duration::days(7));
        let outcome = db
            .rotate_refresh_token("ghost", "r1", "r2", &entry)
            .await
            .unwrap();
        assert_eq!(outcome, RotationOutcome::UserMissing);
        assert!(!db.is_blacklisted(&entry.token_hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_blacklist_entries_are_purged() {
        let db = MemoryDb::new();
        let entry = BlacklistEntry::new("old", Utc::now() - Duration::seconds(1));
        db.blacklist_token(&entry).await.unwrap();
        assert!(!db.is_blacklisted(&entry.token_hash).await.unwrap());
        assert!(db.blacklist.is_empty());
    }

    #[tokio::test]
    async fn test_progress_version_conflict() {
        let db = MemoryDb::new();
        let progress = WorkoutProgress {
            user: "u1".into(),
            plan: "p1".into(),
            exercises: Vec::new(),
            current_exercise_index: 0,
            start_time: Utc::now(),
            last_updated: Utc::now(),
            total_pause_time: 0.0,
            skipped_pauses: 0,
            last_set_values: None,
            completed_sets: 0,
            total_sets: 0,
            notes: Vec::new(),
            version: 0,
        };
        let first = db.save_progress(progress.clone(), None).await.unwrap();
        assert_eq!(first.version, 0);
        let second = db.save_progress(progress.clone(), Some(0)).await.unwrap();
        assert_eq!(second.version, 1);
        assert!(matches!(
            db.save_progress(progress, Some(0)).await,
            Err(AppError::StaleWrite(_))
        ));
    }
}
