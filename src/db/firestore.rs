// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile, refresh-token ledger)
//! - Token blacklist (TTL-expiring, keyed by token hash)
//! - Exercises, deleted-exercise archive and workout plans
//! - Workouts and in-progress sessions

use crate::db::{collections, next_progress_version, RotationOutcome, Store, UserEdit};
use crate::error::AppError;
use crate::models::{
    BlacklistEntry, DeletedExercise, Exercise, User, Workout, WorkoutPlan, WorkoutProgress,
};
use async_trait::async_trait;
use chrono::Utc;
use firestore::{FirestoreConsistencySelector, FirestoreQueryDirection, FirestoreTransaction};
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Ledger fields written by session transitions.
const LEDGER_FIELDS: [&str; 2] = ["activeRefreshTokens", "updatedAt"];

/// Transaction attempts for a contended user edit.
const USER_EDIT_ATTEMPTS: usize = 5;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator needs no credentials; skip ADC lookup entirely.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    async fn begin(&self) -> Result<FirestoreTransaction<'_>, AppError> {
        self.client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))
    }

    /// A client whose reads are registered in `transaction`.
    fn reader_for(&self, transaction: &FirestoreTransaction<'_>) -> firestore::FirestoreDb {
        self.client
            .clone_with_consistency_selector(FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ))
    }

    // ─── Generic helpers ─────────────────────────────────────────

    async fn get_doc<T>(&self, collection: &str, id: &str) -> Result<Option<T>, AppError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.client
            .fluent()
            .select()
            .by_id_in(collection)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn set_doc<T>(&self, collection: &str, id: &str, object: &T) -> Result<(), AppError>
    where
        T: serde::Serialize + for<'de> serde::Deserialize<'de> + Sync + Send,
    {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collection)
            .document_id(id)
            .object(object)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_doc(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.client
            .fluent()
            .delete()
            .from(collection)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Documents in `collection` whose `field` equals `value`.
    async fn query_eq<T>(
        &self,
        collection: &str,
        field: &'static str,
        value: String,
    ) -> Result<Vec<T>, AppError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        self.client
            .fluent()
            .select()
            .from(collection)
            .filter(move |q| q.for_all([q.field(field).eq(value.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Documents owned by `user_id` plus all default documents.
    async fn owned_or_default<T>(
        &self,
        collection: &str,
        user_id: &str,
    ) -> Result<Vec<T>, AppError>
    where
        T: serde::de::DeserializeOwned + Send,
    {
        let client = &self.client;
        let user_id = user_id.to_string();
        let own = client
            .fluent()
            .select()
            .from(collection)
            .filter(move |q| q.for_all([q.field("user").eq(user_id.clone())]))
            .order_by([("createdAt", FirestoreQueryDirection::Ascending)])
            .obj::<T>()
            .query();
        let defaults = client
            .fluent()
            .select()
            .from(collection)
            .filter(|q| q.for_all([q.field("isDefault").eq(true)]))
            .order_by([("createdAt", FirestoreQueryDirection::Ascending)])
            .obj::<T>()
            .query();

        let (mut own, defaults) = tokio::try_join!(own, defaults)
            .map_err(|e| AppError::Database(e.to_string()))?;
        own.extend(defaults);
        Ok(own)
    }

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = &self.client;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = self.begin().await?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    /// Read a user inside `transaction`, registering the document for
    /// conflict detection.
    async fn read_user_in(
        &self,
        transaction: &FirestoreTransaction<'_>,
        user_id: &str,
    ) -> Result<Option<User>, AppError> {
        self.reader_for(transaction)
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read user in transaction: {}", e)))
    }

    fn write_profile_in(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        user: &User,
    ) -> Result<(), AppError> {
        self.client
            .fluent()
            .update()
            .fields(User::PROFILE_FIELDS.iter().copied())
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .add_to_transaction(transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add profile to transaction: {}", e))
            })?;
        Ok(())
    }

    fn write_ledger_in(
        &self,
        transaction: &mut FirestoreTransaction<'_>,
        user: &User,
    ) -> Result<(), AppError> {
        self.client
            .fluent()
            .update()
            .fields(LEDGER_FIELDS)
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .add_to_transaction(transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add ledger to transaction: {}", e))
            })?;
        Ok(())
    }
}

#[async_trait]
impl Store for FirestoreDb {
    // ─── User Operations ─────────────────────────────────────────

    async fn create_user(&self, user: &User) -> Result<(), AppError> {
        let mut transaction = self.begin().await?;
        let reader = self.reader_for(&transaction);

        let username = user.username.clone();
        let email = user.email.clone();
        let by_username = reader
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("username").eq(username.clone())]))
            .limit(1)
            .obj::<User>()
            .query();
        let by_email = reader
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("email").eq(email.clone())]))
            .limit(1)
            .obj::<User>()
            .query();
        let (by_username, by_email) = tokio::try_join!(by_username, by_email)
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !by_username.is_empty() || !by_email.is_empty() {
            let _ = transaction.rollback().await;
            return Err(AppError::Conflict(
                "User with this email or username already exists".to_string(),
            ));
        }

        self.client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add user to transaction: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(user_id = %user.id, "User created");
        Ok(())
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_doc(collections::USERS, user_id).await
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let users: Vec<User> = self
            .query_eq(collections::USERS, "username", username.to_string())
            .await?;
        Ok(users.into_iter().next())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let users: Vec<User> = self
            .query_eq(collections::USERS, "email", email.to_string())
            .await?;
        Ok(users.into_iter().next())
    }

    async fn update_user(
        &self,
        user_id: &str,
        edit: &UserEdit<'_>,
    ) -> Result<Option<User>, AppError> {
        for attempt in 1..=USER_EDIT_ATTEMPTS {
            let mut transaction = self.begin().await?;

            let Some(mut user) = self.read_user_in(&transaction, user_id).await? else {
                let _ = transaction.rollback().await;
                return Ok(None);
            };
            edit(&mut user);
            user.updated_at = Utc::now();
            self.write_profile_in(&mut transaction, &user)?;

            // A failed commit means another writer touched the user; rerun
            // the edit against the fresh document.
            match transaction.commit().await {
                Ok(_) => return Ok(Some(user)),
                Err(e) => {
                    tracing::warn!(user_id, attempt, error = %e, "User update commit failed")
                }
            }
        }
        Err(AppError::Database(format!(
            "User update failed after {} attempts",
            USER_EDIT_ATTEMPTS
        )))
    }

    async fn start_session(&self, user_id: &str, refresh_token: &str) -> Result<bool, AppError> {
        let mut transaction = self.begin().await?;

        let Some(mut user) = self.read_user_in(&transaction, user_id).await? else {
            let _ = transaction.rollback().await;
            return Ok(false);
        };

        user.active_refresh_tokens.clear();
        user.active_refresh_tokens.add(refresh_token);
        user.updated_at = Utc::now();
        self.write_ledger_in(&mut transaction, &user)?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(true)
    }

    async fn rotate_refresh_token(
        &self,
        user_id: &str,
        old_token: &str,
        new_token: &str,
        old_token_entry: &BlacklistEntry,
    ) -> Result<RotationOutcome, AppError> {
        let mut transaction = self.begin().await?;

        // 1. Read the ledger within the transaction
        let Some(mut user) = self.read_user_in(&transaction, user_id).await? else {
            let _ = transaction.rollback().await;
            return Ok(RotationOutcome::UserMissing);
        };

        // 2. Membership check; a rotated-out token writes nothing
        if !user.active_refresh_tokens.remove(old_token) {
            let _ = transaction.rollback().await;
            return Ok(RotationOutcome::NotActive);
        }

        // 3. Ledger swap and blacklist write commit together
        user.active_refresh_tokens.add(new_token);
        user.updated_at = Utc::now();
        self.write_ledger_in(&mut transaction, &user)?;

        self.client
            .fluent()
            .update()
            .in_col(collections::TOKEN_BLACKLIST)
            .document_id(&old_token_entry.token_hash)
            .object(old_token_entry)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add blacklist to transaction: {}", e))
            })?;

        // 4. A failed commit means a concurrent writer won; reject rather
        //    than risk minting two pairs from one token.
        if let Err(e) = transaction.commit().await {
            tracing::warn!(user_id, error = %e, "Refresh rotation commit failed");
            return Ok(RotationOutcome::NotActive);
        }

        Ok(RotationOutcome::Rotated)
    }

    async fn revoke_refresh_token(&self, user_id: &str, token: &str) -> Result<(), AppError> {
        let mut transaction = self.begin().await?;

        let Some(mut user) = self.read_user_in(&transaction, user_id).await? else {
            let _ = transaction.rollback().await;
            return Ok(());
        };
        if !user.active_refresh_tokens.remove(token) {
            let _ = transaction.rollback().await;
            return Ok(());
        }
        user.updated_at = Utc::now();
        self.write_ledger_in(&mut transaction, &user)?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(())
    }

    /// Delete ALL data for a user.
    ///
    /// Deletes from all collections:
    /// - `exercises`, `workout_plans` (query by `user`)
    /// - `workouts` (query by `user`)
    /// - `workout_progress/{user_id}`
    /// - `users/{user_id}`
    async fn delete_user_cascade(&self, user_id: &str) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        // 1. Owned exercises
        let exercises: Vec<Exercise> = self
            .query_eq(collections::EXERCISES, "user", user_id.to_string())
            .await?;
        self.batch_delete(&exercises, collections::EXERCISES, |e: &Exercise| {
            e.id.clone()
        })
        .await?;
        deleted_count += exercises.len();
        tracing::debug!(user_id, count = exercises.len(), "Deleted exercises");

        // 2. Owned plans
        let plans: Vec<WorkoutPlan> = self
            .query_eq(collections::WORKOUT_PLANS, "user", user_id.to_string())
            .await?;
        self.batch_delete(&plans, collections::WORKOUT_PLANS, |p: &WorkoutPlan| {
            p.id.clone()
        })
        .await?;
        deleted_count += plans.len();
        tracing::debug!(user_id, count = plans.len(), "Deleted workout plans");

        // 3. Workouts
        let workouts: Vec<Workout> = self
            .query_eq(collections::WORKOUTS, "user", user_id.to_string())
            .await?;
        self.batch_delete(&workouts, collections::WORKOUTS, |w: &Workout| w.id.clone())
            .await?;
        deleted_count += workouts.len();
        tracing::debug!(user_id, count = workouts.len(), "Deleted workouts");

        // 4. Progress and profile
        self.delete_doc(collections::WORKOUT_PROGRESS, user_id).await?;
        self.delete_doc(collections::USERS, user_id).await?;
        deleted_count += 2;

        tracing::info!(user_id, deleted_count, "User data deletion complete");

        Ok(deleted_count)
    }

    // ─── Token Blacklist ─────────────────────────────────────────

    async fn blacklist_token(&self, entry: &BlacklistEntry) -> Result<(), AppError> {
        self.set_doc(collections::TOKEN_BLACKLIST, &entry.token_hash, entry)
            .await
    }

    async fn is_blacklisted(&self, token_hash: &str) -> Result<bool, AppError> {
        let entry: Option<BlacklistEntry> =
            self.get_doc(collections::TOKEN_BLACKLIST, token_hash).await?;
        // TTL deletion can lag by up to a day; honor expiry here too.
        Ok(entry.is_some_and(|e| e.is_active_at(Utc::now())))
    }

    // ─── Exercise Operations ─────────────────────────────────────

    async fn get_exercise(&self, exercise_id: &str) -> Result<Option<Exercise>, AppError> {
        self.get_doc(collections::EXERCISES, exercise_id).await
    }

    async fn get_exercises(&self, ids: &[String]) -> Result<Vec<Exercise>, AppError> {
        let found: Vec<Option<Exercise>> = stream::iter(ids.iter().cloned())
            .map(|id| async move { self.get_doc::<Exercise>(collections::EXERCISES, &id).await })
            .buffered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<Option<Exercise>, AppError>>>()
            .await
            .into_iter()
            .collect::<Result<_, _>>()?;
        Ok(found.into_iter().flatten().collect())
    }

    async fn list_exercises_for_user(&self, user_id: &str) -> Result<Vec<Exercise>, AppError> {
        self.owned_or_default(collections::EXERCISES, user_id).await
    }

    async fn save_exercise(&self, exercise: &Exercise) -> Result<(), AppError> {
        self.set_doc(collections::EXERCISES, &exercise.id, exercise)
            .await
    }

    async fn delete_exercise(&self, exercise_id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::EXERCISES, exercise_id).await
    }

    async fn archive_exercise(&self, record: &DeletedExercise) -> Result<(), AppError> {
        self.set_doc(collections::DELETED_EXERCISES, &record.id, record)
            .await
    }

    async fn get_deleted_exercise(&self, id: &str) -> Result<Option<DeletedExercise>, AppError> {
        self.get_doc(collections::DELETED_EXERCISES, id).await
    }

    async fn list_deleted_exercises(&self) -> Result<Vec<DeletedExercise>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::DELETED_EXERCISES)
            .order_by([("deletedAt", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn remove_deleted_exercise(&self, id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::DELETED_EXERCISES, id).await
    }

    // ─── Workout Plan Operations ─────────────────────────────────

    async fn get_plan(&self, plan_id: &str) -> Result<Option<WorkoutPlan>, AppError> {
        self.get_doc(collections::WORKOUT_PLANS, plan_id).await
    }

    async fn find_plan_by_share_id(
        &self,
        share_id: &str,
    ) -> Result<Option<WorkoutPlan>, AppError> {
        let plans: Vec<WorkoutPlan> = self
            .query_eq(collections::WORKOUT_PLANS, "shareId", share_id.to_string())
            .await?;
        Ok(plans.into_iter().next())
    }

    async fn list_plans_for_user(&self, user_id: &str) -> Result<Vec<WorkoutPlan>, AppError> {
        self.owned_or_default(collections::WORKOUT_PLANS, user_id)
            .await
    }

    async fn save_plan(&self, plan: &WorkoutPlan) -> Result<(), AppError> {
        self.set_doc(collections::WORKOUT_PLANS, &plan.id, plan).await
    }

    async fn delete_plan(&self, plan_id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::WORKOUT_PLANS, plan_id).await
    }

    async fn import_plan(
        &self,
        plan: &WorkoutPlan,
        new_exercises: &[Exercise],
    ) -> Result<(), AppError> {
        if new_exercises.len() + 1 > BATCH_SIZE {
            return Err(AppError::BadRequest(
                "Shared workout plan has too many exercises to import".to_string(),
            ));
        }

        let client = &self.client;
        let mut transaction = self.begin().await?;

        for exercise in new_exercises {
            client
                .fluent()
                .update()
                .in_col(collections::EXERCISES)
                .document_id(&exercise.id)
                .object(exercise)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add exercise to transaction: {}", e))
                })?;
        }

        client
            .fluent()
            .update()
            .in_col(collections::WORKOUT_PLANS)
            .document_id(&plan.id)
            .object(plan)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add plan to transaction: {}", e)))?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            plan_id = %plan.id,
            new_exercises = new_exercises.len(),
            "Plan imported atomically"
        );
        Ok(())
    }

    async fn detach_workouts_from_plan(&self, plan_id: &str) -> Result<usize, AppError> {
        let client = &self.client;
        let workouts: Vec<Workout> = self
            .query_eq(collections::WORKOUTS, "plan", plan_id.to_string())
            .await?;
        let now = Utc::now();

        for chunk in workouts.chunks(BATCH_SIZE) {
            let mut transaction = self.begin().await?;
            for workout in chunk {
                let mut detached = workout.clone();
                detached.plan = None;
                detached.plan_deleted = true;
                detached.updated_at = now;
                client
                    .fluent()
                    .update()
                    .fields(["plan", "planDeleted", "updatedAt"])
                    .in_col(collections::WORKOUTS)
                    .document_id(&detached.id)
                    .object(&detached)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add workout to transaction: {}", e))
                    })?;
            }
            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit workout detach: {}", e))
            })?;
        }

        Ok(workouts.len())
    }

    // ─── Workout Operations ──────────────────────────────────────

    async fn get_workout(&self, workout_id: &str) -> Result<Option<Workout>, AppError> {
        self.get_doc(collections::WORKOUTS, workout_id).await
    }

    async fn list_workouts_for_user(&self, user_id: &str) -> Result<Vec<Workout>, AppError> {
        let user_id = user_id.to_string();
        self.client
            .fluent()
            .select()
            .from(collections::WORKOUTS)
            .filter(move |q| q.for_all([q.field("user").eq(user_id.clone())]))
            .order_by([("startTime", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn save_workout(&self, workout: &Workout) -> Result<(), AppError> {
        self.set_doc(collections::WORKOUTS, &workout.id, workout)
            .await
    }

    async fn delete_workout(&self, workout_id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::WORKOUTS, workout_id).await
    }

    // ─── Workout Progress Operations ─────────────────────────────

    async fn get_progress(&self, user_id: &str) -> Result<Option<WorkoutProgress>, AppError> {
        self.get_doc(collections::WORKOUT_PROGRESS, user_id).await
    }

    async fn save_progress(
        &self,
        mut progress: WorkoutProgress,
        expected_version: Option<u32>,
    ) -> Result<WorkoutProgress, AppError> {
        let mut transaction = self.begin().await?;

        let current: Option<WorkoutProgress> = self
            .reader_for(&transaction)
            .fluent()
            .select()
            .by_id_in(collections::WORKOUT_PROGRESS)
            .obj()
            .one(&progress.user)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read progress in transaction: {}", e))
            })?;

        progress.version = match next_progress_version(current.as_ref(), expected_version) {
            Ok(version) => version,
            Err(e) => {
                let _ = transaction.rollback().await;
                return Err(e);
            }
        };

        self.client
            .fluent()
            .update()
            .in_col(collections::WORKOUT_PROGRESS)
            .document_id(&progress.user)
            .object(&progress)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add progress to transaction: {}", e))
            })?;

        if let Err(e) = transaction.commit().await {
            tracing::warn!(user_id = %progress.user, error = %e, "Progress commit failed");
            return Err(AppError::StaleWrite(
                "Data is out of sync. Please refresh and try again.".to_string(),
            ));
        }

        Ok(progress)
    }

    async fn delete_progress(&self, user_id: &str) -> Result<(), AppError> {
        self.delete_doc(collections::WORKOUT_PROGRESS, user_id).await
    }
}
