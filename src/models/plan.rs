// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout plan model and share/import helpers.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};

use crate::models::exercise::{Exercise, ImportedFrom};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Strength,
    Cardio,
    Flexibility,
    #[default]
    Other,
}

/// Workout plan stored in the `workout_plans` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutPlan {
    pub id: String,
    pub name: String,
    /// Owner; None for default plans
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    /// Ordered exercise IDs
    #[serde(default)]
    pub exercises: Vec<String>,
    #[serde(default)]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    pub plan_type: PlanType,
    #[serde(default)]
    pub share_id: Option<String>,
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imported_from: Option<ImportedFrom>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkoutPlan {
    pub fn new(name: &str, user: Option<String>, is_default: bool) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            user,
            is_default,
            exercises: Vec::new(),
            scheduled_date: None,
            plan_type: PlanType::default(),
            share_id: None,
            is_shared: false,
            imported_from: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the plan shared, minting a share ID on first share.
    pub fn ensure_shared(&mut self) -> Result<&str, ring::error::Unspecified> {
        if self.share_id.is_none() {
            self.share_id = Some(generate_share_id()?);
        }
        self.is_shared = true;
        self.updated_at = Utc::now();
        Ok(self.share_id.as_deref().unwrap_or_default())
    }

    pub fn share_link(&self, frontend_url: &str) -> Option<String> {
        self.share_id.as_ref().map(|id| {
            format!(
                "{}/import-plan/{}",
                frontend_url.trim_end_matches('/'),
                urlencoding::encode(id)
            )
        })
    }

    /// A private copy of this shared plan owned by `importer_id`.
    pub fn import_copy(
        &self,
        importer_id: &str,
        owner_username: Option<String>,
        exercise_ids: Vec<String>,
    ) -> WorkoutPlan {
        let now = Utc::now();
        WorkoutPlan {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name.clone(),
            user: Some(importer_id.to_string()),
            is_default: false,
            exercises: exercise_ids,
            scheduled_date: None,
            plan_type: self.plan_type,
            share_id: None,
            is_shared: false,
            imported_from: Some(ImportedFrom {
                user: self.user.clone(),
                username: owner_username,
                import_date: now,
                share_id: self.share_id.clone(),
            }),
            created_at: now,
            updated_at: now,
        }
    }
}

/// 16 random bytes, URL-safe base64.
fn generate_share_id() -> Result<String, ring::error::Unspecified> {
    let mut bytes = [0u8; 16];
    SystemRandom::new().fill(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Plan with its exercises resolved, as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanView {
    pub id: String,
    pub name: String,
    pub user: Option<String>,
    pub is_default: bool,
    pub exercises: Vec<Exercise>,
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub plan_type: PlanType,
    pub share_id: Option<String>,
    pub is_shared: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_from: Option<ImportedFrom>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlanView {
    /// Combine a plan with its resolved exercises (missing ones are skipped).
    pub fn new(plan: WorkoutPlan, exercises: Vec<Exercise>) -> Self {
        Self {
            id: plan.id,
            name: plan.name,
            user: plan.user,
            is_default: plan.is_default,
            exercises,
            scheduled_date: plan.scheduled_date,
            plan_type: plan.plan_type,
            share_id: plan.share_id,
            is_shared: plan.is_shared,
            imported_from: plan.imported_from,
            created_at: plan.created_at,
            updated_at: plan.updated_at,
        }
    }
}
