// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Run with `FIRESTORE_EMULATOR_HOST=localhost:8080 cargo test`.
//!
//! The emulator provides a clean state for each test run.

use chrono::{Duration, Utc};
use levelup_tracker::db::{RotationOutcome, Store};
use levelup_tracker::error::AppError;
use levelup_tracker::models::token::hash_token;
use levelup_tracker::models::{
    BlacklistEntry, Exercise, ExerciseCategory, Recommendations, User, WorkoutPlan,
    WorkoutProgress,
};

mod common;
use common::test_db;

/// Unique suffix for test isolation.
fn unique() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

fn test_user() -> User {
    let suffix = unique();
    User::new(
        &format!("user_{}", &suffix[..12]),
        &format!("{}@example.com", suffix),
        "hash".to_string(),
    )
}

fn exercise(owner: Option<String>, name: &str) -> Exercise {
    let now = Utc::now();
    Exercise {
        id: unique(),
        name: name.to_string(),
        description: "desc".to_string(),
        target: vec!["Legs".to_string()],
        image_url: "https://example.com/x.gif".to_string(),
        category: ExerciseCategory::Strength,
        exercise_type: "strength".to_string(),
        measurement_type: "weight_reps".to_string(),
        recommendations: Recommendations::default(),
        is_default: owner.is_none(),
        user: owner,
        imported_from: None,
        created_at: now,
        updated_at: now,
    }
}

fn progress(user_id: &str) -> WorkoutProgress {
    let now = Utc::now();
    WorkoutProgress {
        user: user_id.to_string(),
        plan: "p1".to_string(),
        exercises: Vec::new(),
        current_exercise_index: 0,
        start_time: now,
        last_updated: now,
        total_pause_time: 0.0,
        skipped_pauses: 0,
        last_set_values: None,
        completed_sets: 0,
        total_sets: 0,
        notes: Vec::new(),
        version: 0,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// USER TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_user_roundtrip_and_uniqueness() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user();
    db.create_user(&user).await.unwrap();

    let fetched = db.get_user(&user.id).await.unwrap().expect("user exists");
    assert_eq!(fetched.username, user.username);
    assert_eq!(
        db.find_user_by_email(&user.email)
            .await
            .unwrap()
            .map(|u| u.id),
        Some(user.id.clone())
    );

    let mut clash = test_user();
    clash.username = user.username.clone();
    let err = db.create_user(&clash).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_user_edit_does_not_touch_ledger() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user();
    db.create_user(&user).await.unwrap();
    assert!(db.start_session(&user.id, "refresh-1").await.unwrap());

    db.update_user(&user.id, &|u: &mut User| {
        u.has_seen_guide = true;
        u.active_refresh_tokens.clear();
    })
    .await
    .unwrap()
    .expect("user exists");

    let fetched = db.get_user(&user.id).await.unwrap().unwrap();
    assert!(fetched.has_seen_guide);
    assert!(fetched.active_refresh_tokens.contains("refresh-1"));
}

#[tokio::test]
async fn test_concurrent_hides_are_all_kept() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user();
    db.create_user(&user).await.unwrap();

    let hide = |id: &'static str| {
        let db = db.clone();
        let user_id = user.id.clone();
        async move {
            db.update_user(&user_id, &|u: &mut User| {
                u.deleted_exercises.insert(id.to_string());
            })
            .await
        }
    };
    let (a, b) = tokio::join!(hide("e1"), hide("e2"));
    a.unwrap();
    b.unwrap();

    let fetched = db.get_user(&user.id).await.unwrap().unwrap();
    assert!(fetched.deleted_exercises.contains("e1"));
    assert!(fetched.deleted_exercises.contains("e2"));
}

// ═══════════════════════════════════════════════════════════════════════════
// SESSION TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_rotation_is_single_use() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user();
    db.create_user(&user).await.unwrap();
    db.start_session(&user.id, "old").await.unwrap();

    let entry = BlacklistEntry::new("old", Utc::now() + Duration::days(7));
    let first = db
        .rotate_refresh_token(&user.id, "old", "new-a", &entry)
        .await
        .unwrap();
    let second = db
        .rotate_refresh_token(&user.id, "old", "new-b", &entry)
        .await
        .unwrap();
    assert_eq!(first, RotationOutcome::Rotated);
    assert_eq!(second, RotationOutcome::NotActive);

    let fetched = db.get_user(&user.id).await.unwrap().unwrap();
    assert_eq!(fetched.active_refresh_tokens.tokens(), ["new-a".to_string()]);
    assert!(db.is_blacklisted(&hash_token("old")).await.unwrap());

    let missing = db
        .rotate_refresh_token("no-such-user", "x", "y", &entry)
        .await
        .unwrap();
    assert_eq!(missing, RotationOutcome::UserMissing);
}

#[tokio::test]
async fn test_blacklist_ignores_expired_entries() {
    require_emulator!();

    let db = test_db().await;
    let token = unique();
    let entry = BlacklistEntry::new(&token, Utc::now() - Duration::minutes(1));
    db.blacklist_token(&entry).await.unwrap();
    assert!(!db.is_blacklisted(&hash_token(&token)).await.unwrap());
}

// ═══════════════════════════════════════════════════════════════════════════
// CATALOG TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_import_and_cascade_delete() {
    require_emulator!();

    let db = test_db().await;
    let user = test_user();
    db.create_user(&user).await.unwrap();

    let copy = exercise(Some(user.id.clone()), "Squat");
    let mut plan = WorkoutPlan::new("Leg day", Some(user.id.clone()), false);
    plan.exercises = vec![copy.id.clone()];
    db.import_plan(&plan, std::slice::from_ref(&copy))
        .await
        .unwrap();

    assert!(db.get_exercise(&copy.id).await.unwrap().is_some());
    let plans = db.list_plans_for_user(&user.id).await.unwrap();
    assert!(plans.iter().any(|p| p.id == plan.id));

    db.save_progress(progress(&user.id), None).await.unwrap();

    let removed = db.delete_user_cascade(&user.id).await.unwrap();
    assert!(removed >= 4);
    assert!(db.get_user(&user.id).await.unwrap().is_none());
    assert!(db.get_plan(&plan.id).await.unwrap().is_none());
    assert!(db.get_progress(&user.id).await.unwrap().is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// PROGRESS TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_progress_version_conflict() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique();

    let first = db.save_progress(progress(&user_id), None).await.unwrap();
    let second = db
        .save_progress(progress(&user_id), Some(first.version))
        .await
        .unwrap();
    assert_eq!(second.version, first.version + 1);

    let err = db
        .save_progress(progress(&user_id), Some(first.version))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StaleWrite(_)));

    db.delete_progress(&user_id).await.unwrap();
}
