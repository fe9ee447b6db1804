// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout plan ownership, sharing and import.

mod common;

use axum::http::StatusCode;
use common::{create_test_app, TestApp};
use levelup_tracker::db::Store;
use serde_json::{json, Value};

async fn create_exercise(app: &TestApp, token: &str, name: &str) -> String {
    let (status, body) = app
        .post(
            "/api/exercises",
            Some(token),
            json!({ "name": name, "description": "desc", "target": ["Legs"] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].as_str().unwrap().to_string()
}

async fn create_plan(app: &TestApp, token: &str, name: &str, exercises: &[String]) -> Value {
    let (status, body) = app
        .post(
            "/api/workoutplans",
            Some(token),
            json!({ "name": name, "exercises": exercises, "type": "strength" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

#[tokio::test]
async fn test_plan_is_populated_with_exercises() {
    let app = create_test_app();
    let (_, token) = app.signed_in("alice").await;
    let squat = create_exercise(&app, &token, "Squat").await;
    let lunge = create_exercise(&app, &token, "Lunge").await;

    let plan = create_plan(&app, &token, "Leg day", &[squat, lunge]).await;
    assert_eq!(plan["type"], "strength");
    let names: Vec<&str> = plan["exercises"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Squat", "Lunge"]);

    let (status, list) = app.get("/api/workoutplans", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["plans"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicate_plan_name_is_conflict() {
    let app = create_test_app();
    let (_, token) = app.signed_in("alice").await;
    let plan = create_plan(&app, &token, "Push", &[]).await;
    let other = create_plan(&app, &token, "Pull", &[]).await;

    let (status, body) = app
        .put(
            &format!("/api/workoutplans/{}", other["id"].as_str().unwrap()),
            &token,
            json!({ "name": "Push" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "A workout plan with this name already exists");

    // Re-posting the same name updates the existing plan in place
    let squat = create_exercise(&app, &token, "Squat").await;
    let (status, body) = app
        .post(
            "/api/workoutplans",
            Some(&token),
            json!({ "name": "Push", "exercises": [squat] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], plan["id"]);
    assert_eq!(body["exercises"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_other_users_plan_is_not_found() {
    let app = create_test_app();
    let (_, alice) = app.signed_in("alice").await;
    let (_, bob) = app.signed_in("bob").await;
    let plan = create_plan(&app, &alice, "Private", &[]).await;
    let uri = format!("/api/workoutplans/{}", plan["id"].as_str().unwrap());

    let (status, _) = app.get(&uri, &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.delete(&uri, &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.post(&format!("{}/share", uri), Some(&bob), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_share_and_import_produce_independent_copy() {
    let app = create_test_app();
    let (alice_id, alice) = app.signed_in("alice").await;
    let (bob_id, bob) = app.signed_in("bob").await;

    let squat = create_exercise(&app, &alice, "Squat").await;
    let plan = create_plan(&app, &alice, "Leg day", &[squat.clone()]).await;
    let plan_id = plan["id"].as_str().unwrap().to_string();

    let (status, shared) = app
        .post(&format!("/api/workoutplans/{}/share", plan_id), Some(&alice), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shared["plan"]["isShared"], true);
    let link = shared["shareLink"].as_str().unwrap();
    let share_id = link.rsplit('/').next().unwrap().to_string();
    assert_eq!(shared["plan"]["shareId"], share_id.as_str());

    // Sharing again keeps the same link
    let (_, again) = app
        .post(&format!("/api/workoutplans/{}/share", plan_id), Some(&alice), json!({}))
        .await;
    assert_eq!(again["shareLink"], shared["shareLink"]);

    let (status, imported) = app
        .post(&format!("/api/workoutplans/import/{}", share_id), Some(&bob), json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(imported["id"], plan["id"]);
    assert_eq!(imported["user"], bob_id.as_str());
    assert_eq!(imported["importedFrom"]["user"], alice_id.as_str());
    assert_eq!(imported["importedFrom"]["username"], "alice");
    assert_eq!(imported["isShared"], false);

    let copy = &imported["exercises"][0];
    assert_ne!(copy["id"], squat.as_str());
    assert_eq!(copy["user"], bob_id.as_str());
    assert_eq!(copy["importedFrom"]["user"], alice_id.as_str());

    // Mutating the copy leaves the original untouched
    let copy_id = copy["id"].as_str().unwrap();
    let (status, _) = app
        .put(
            &format!("/api/exercises/{}", copy_id),
            &bob,
            json!({ "name": "Bob squat" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let original = app.db.get_exercise(&squat).await.unwrap().unwrap();
    assert_eq!(original.name, "Squat");

    let imported_id = imported["id"].as_str().unwrap();
    let (status, _) = app
        .delete(&format!("/api/workoutplans/{}", imported_id), &bob)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(app.db.get_plan(&plan_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_import_reuses_visible_exercise_by_name() {
    let app = create_test_app();
    let (_, alice) = app.signed_in("alice").await;
    let (_, bob) = app.signed_in("bob").await;

    let squat = create_exercise(&app, &alice, "Squat").await;
    let bob_squat = create_exercise(&app, &bob, "Squat").await;
    let plan = create_plan(&app, &alice, "Leg day", &[squat]).await;

    let (_, shared) = app
        .post(
            &format!("/api/workoutplans/{}/share", plan["id"].as_str().unwrap()),
            Some(&alice),
            json!({}),
        )
        .await;
    let share_id = shared["plan"]["shareId"].as_str().unwrap();

    let (_, imported) = app
        .post(&format!("/api/workoutplans/import/{}", share_id), Some(&bob), json!({}))
        .await;
    assert_eq!(imported["exercises"][0]["id"], bob_squat.as_str());
}

#[tokio::test]
async fn test_import_rejects_name_the_importer_already_uses() {
    let app = create_test_app();
    let (_, alice) = app.signed_in("alice").await;
    let (_, bob) = app.signed_in("bob").await;

    let squat = create_exercise(&app, &alice, "Squat").await;
    let plan = create_plan(&app, &alice, "Leg day", &[squat]).await;
    create_plan(&app, &bob, "Leg day", &[]).await;

    let (_, shared) = app
        .post(
            &format!("/api/workoutplans/{}/share", plan["id"].as_str().unwrap()),
            Some(&alice),
            json!({}),
        )
        .await;
    let share_id = shared["plan"]["shareId"].as_str().unwrap();

    let (status, body) = app
        .post(&format!("/api/workoutplans/import/{}", share_id), Some(&bob), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "A workout plan with this name already exists");

    let (_, list) = app.get("/api/workoutplans", &bob).await;
    let named = list["plans"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["name"] == "Leg day")
        .count();
    assert_eq!(named, 1);
}

#[tokio::test]
async fn test_import_of_unknown_share_id() {
    let app = create_test_app();
    let (_, bob) = app.signed_in("bob").await;
    let (status, _) = app
        .post("/api/workoutplans/import/nope", Some(&bob), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_plan_detaches_workouts() {
    let app = create_test_app();
    let (_, token) = app.signed_in("alice").await;
    let plan = create_plan(&app, &token, "Leg day", &[]).await;
    let plan_id = plan["id"].as_str().unwrap();

    let (status, workout) = app
        .post(
            "/api/workouts",
            Some(&token),
            json!({
                "plan": plan_id,
                "planName": "Leg day",
                "exercises": [{
                    "exercise": "x",
                    "sets": [],
                    "completedAt": "2026-01-01T10:30:00Z"
                }],
                "startTime": "2026-01-01T10:00:00Z",
                "endTime": "2026-01-01T11:00:00Z"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", workout);

    let (status, _) = app
        .delete(&format!("/api/workoutplans/{}", plan_id), &token)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, stored) = app
        .get(
            &format!("/api/workouts/{}", workout["id"].as_str().unwrap()),
            &token,
        )
        .await;
    assert_eq!(stored["planDeleted"], true);
    assert!(stored["plan"].is_null());
    assert_eq!(stored["planName"], "Leg day");
}

#[tokio::test]
async fn test_default_plans_hide_per_user_and_admin_removes() {
    let app = create_test_app();
    let (admin_id, admin) = app.signed_in("admin").await;
    app.make_admin(&admin_id).await;
    let (_, u1) = app.signed_in("u1").await;
    let (_, u2) = app.signed_in("u2").await;

    let (status, plan) = app
        .post(
            "/api/workoutplans/default",
            Some(&admin),
            json!({ "name": "Starter", "exercises": [] }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(plan["isDefault"], true);
    let uri = format!("/api/workoutplans/{}", plan["id"].as_str().unwrap());

    // Non-admins cannot edit or share defaults
    let (status, _) = app.put(&uri, &u1, json!({ "type": "cardio" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.post(&format!("{}/share", uri), Some(&u1), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.delete(&uri, &u1).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Workout plan removed from your view");
    let (_, list) = app.get("/api/workoutplans", &u1).await;
    assert!(list["plans"].as_array().unwrap().is_empty());
    let (_, list) = app.get("/api/workoutplans", &u2).await;
    assert_eq!(list["plans"].as_array().unwrap().len(), 1);

    let (status, _) = app.delete(&uri, &admin).await;
    assert_eq!(status, StatusCode::OK);
    let (_, list) = app.get("/api/workoutplans", &u2).await;
    assert!(list["plans"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_plan_exercise_membership() {
    let app = create_test_app();
    let (_, token) = app.signed_in("alice").await;
    let squat = create_exercise(&app, &token, "Squat").await;
    let plan = create_plan(&app, &token, "Leg day", &[]).await;
    let uri = format!("/api/workoutplans/{}/exercises", plan["id"].as_str().unwrap());

    let (status, body) = app
        .post(&uri, Some(&token), json!({ "exerciseId": squat }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exercises"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .post(&uri, Some(&token), json!({ "exerciseId": squat }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.delete(&format!("{}/{}", uri, squat), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["exercises"].as_array().unwrap().is_empty());

    let (status, _) = app.delete(&format!("{}/{}", uri, squat), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
