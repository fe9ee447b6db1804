// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User account model, refresh-token ledger and per-user exercise overlays.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::exercise::Recommendation;

/// Upper bound on concurrently valid refresh tokens per user.
pub const MAX_ACTIVE_REFRESH_TOKENS: usize = 5;

/// Bounded, insertion-ordered list of a user's valid refresh tokens.
///
/// Index 0 is the oldest entry and is evicted first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshTokenLedger(Vec<String>);

impl RefreshTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token, evicting the oldest entries once the ledger is full.
    pub fn add(&mut self, token: impl Into<String>) {
        while self.0.len() >= MAX_ACTIVE_REFRESH_TOKENS {
            self.0.remove(0);
        }
        self.0.push(token.into());
    }

    /// Remove a token by value. Returns whether it was present.
    pub fn remove(&mut self, token: &str) -> bool {
        match self.0.iter().position(|t| t == token) {
            Some(idx) => {
                self.0.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.0.iter().any(|t| t == token)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }
}

/// Training experience level; selects which recommendation set applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// Per-user customization layered over a shared exercise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserExercise {
    pub exercise_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<Recommendation>,
}

impl UserExercise {
    pub fn new(exercise_id: impl Into<String>) -> Self {
        Self {
            exercise_id: exercise_id.into(),
            ..Self::default()
        }
    }
}

/// User account stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Document ID
    pub id: String,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string
    pub password_hash: String,
    #[serde(default)]
    pub experience_level: ExperienceLevel,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub has_seen_guide: bool,

    // ─── Email verification ──────────────────────────────────────
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub email_verification_token: Option<String>,
    #[serde(default)]
    pub email_verification_expires: Option<DateTime<Utc>>,
    /// When the current verification email was issued (resend cooldown)
    #[serde(default)]
    pub email_verification_sent_at: Option<DateTime<Utc>>,

    // ─── Sessions ────────────────────────────────────────────────
    #[serde(default)]
    pub active_refresh_tokens: RefreshTokenLedger,

    // ─── Catalog overlays ────────────────────────────────────────
    #[serde(default)]
    pub user_exercises: Vec<UserExercise>,
    /// Exercises hidden from this user's view
    #[serde(default)]
    pub deleted_exercises: BTreeSet<String>,
    /// Workout plans hidden from this user's view
    #[serde(default)]
    pub deleted_workout_plans: BTreeSet<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Stored fields written by `Store::update_user`.
    ///
    /// `activeRefreshTokens` is absent: the ledger only changes through the
    /// store's session operations.
    pub const PROFILE_FIELDS: &'static [&'static str] = &[
        "username",
        "email",
        "passwordHash",
        "experienceLevel",
        "isAdmin",
        "hasSeenGuide",
        "isEmailVerified",
        "emailVerificationToken",
        "emailVerificationExpires",
        "emailVerificationSentAt",
        "userExercises",
        "deletedExercises",
        "deletedWorkoutPlans",
        "updatedAt",
    ];

    /// A freshly registered, unverified, non-admin user.
    pub fn new(username: &str, email: &str, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            experience_level: ExperienceLevel::default(),
            is_admin: false,
            has_seen_guide: false,
            is_email_verified: false,
            email_verification_token: None,
            email_verification_expires: None,
            email_verification_sent_at: None,
            active_refresh_tokens: RefreshTokenLedger::new(),
            user_exercises: Vec::new(),
            deleted_exercises: BTreeSet::new(),
            deleted_workout_plans: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn overlay(&self, exercise_id: &str) -> Option<&UserExercise> {
        self.user_exercises
            .iter()
            .find(|ue| ue.exercise_id == exercise_id)
    }

    /// Get the overlay for an exercise, creating an empty one if missing.
    pub fn overlay_mut(&mut self, exercise_id: &str) -> &mut UserExercise {
        let idx = match self
            .user_exercises
            .iter()
            .position(|ue| ue.exercise_id == exercise_id)
        {
            Some(idx) => idx,
            None => {
                self.user_exercises.push(UserExercise::new(exercise_id));
                self.user_exercises.len() - 1
            }
        };
        &mut self.user_exercises[idx]
    }

    /// Install a new pending verification token.
    pub fn set_verification_token(&mut self, token: String, expires_at: DateTime<Utc>) {
        let now = Utc::now();
        self.email_verification_token = Some(token);
        self.email_verification_expires = Some(expires_at);
        self.email_verification_sent_at = Some(now);
        self.updated_at = now;
    }

    /// Mark the email verified and drop the pending token.
    pub fn mark_email_verified(&mut self) {
        self.is_email_verified = true;
        self.email_verification_token = None;
        self.email_verification_expires = None;
        self.email_verification_sent_at = None;
        self.updated_at = Utc::now();
    }

    /// Public projection; never includes credentials or the token ledger.
    pub fn projection(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            is_admin: self.is_admin,
            experience_level: self.experience_level,
            has_seen_guide: self.has_seen_guide,
            deleted_workout_plans: self.deleted_workout_plans.iter().cloned().collect(),
        }
    }
}

/// User fields safe to return to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub experience_level: ExperienceLevel,
    pub has_seen_guide: bool,
    pub deleted_workout_plans: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_evicts_oldest_when_full() {
        let mut ledger = RefreshTokenLedger::new();
        for i in 1..=MAX_ACTIVE_REFRESH_TOKENS {
            ledger.add(format!("t{}", i));
        }
        assert_eq!(ledger.len(), MAX_ACTIVE_REFRESH_TOKENS);

        ledger.add("t6");
        assert_eq!(ledger.len(), MAX_ACTIVE_REFRESH_TOKENS);
        assert!(!ledger.contains("t1"));
        assert_eq!(ledger.tokens().first().map(String::as_str), Some("t2"));
        assert_eq!(ledger.tokens().last().map(String::as_str), Some("t6"));
    }

    #[test]
    fn test_ledger_never_exceeds_bound() {
        let mut ledger = RefreshTokenLedger::new();
        for i in 0..50 {
            ledger.add(format!("t{}", i));
            assert!(ledger.len() <= MAX_ACTIVE_REFRESH_TOKENS);
        }
        let expected: Vec<String> = (45..50).map(|i| format!("t{}", i)).collect();
        assert_eq!(ledger.tokens(), expected.as_slice());
    }

    #[test]
    fn test_ledger_remove_is_noop_for_unknown_token() {
        let mut ledger = RefreshTokenLedger::new();
        ledger.add("a");
        ledger.add("b");
        assert!(!ledger.remove("zzz"));
        assert_eq!(ledger.len(), 2);
        assert!(ledger.remove("a"));
        assert_eq!(ledger.tokens(), ["b".to_string()].as_slice());
    }

    #[test]
    fn test_ledger_serializes_as_plain_list() {
        let mut ledger = RefreshTokenLedger::new();
        ledger.add("x");
        assert_eq!(serde_json::to_string(&ledger).unwrap(), r#"["x"]"#);
    }

    #[test]
    fn test_projection_hides_credentials() {
        let mut user = User::new("alice", "a@x.com", "$argon2id$secret".to_string());
        user.active_refresh_tokens.add("refresh");
        let json = serde_json::to_value(user.projection()).unwrap();
        assert_eq!(json["username"], "alice");
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("activeRefreshTokens").is_none());
        assert_eq!(json["experienceLevel"], "beginner");
    }

    #[test]
    fn test_overlay_mut_creates_once() {
        let mut user = User::new("bob", "b@x.com", String::new());
        user.overlay_mut("ex1").name = Some("Custom".into());
        user.overlay_mut("ex1").description = Some("Mine".into());
        assert_eq!(user.user_exercises.len(), 1);
        let overlay = user.overlay("ex1").unwrap();
        assert_eq!(overlay.name.as_deref(), Some("Custom"));
        assert_eq!(overlay.description.as_deref(), Some("Mine"));
    }
}
