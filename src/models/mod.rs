// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod exercise;
pub mod plan;
pub mod token;
pub mod user;
pub mod workout;

pub use exercise::{DeletedExercise, Exercise, ExerciseCategory, Recommendation, Recommendations};
pub use plan::{PlanType, PlanView, WorkoutPlan};
pub use token::BlacklistEntry;
pub use user::{ExperienceLevel, PublicUser, RefreshTokenLedger, User};
pub use workout::{Workout, WorkoutProgress};
