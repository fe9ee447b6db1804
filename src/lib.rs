// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Level Up: workout tracking backend.
//!
//! This crate provides the API for user accounts and sessions, the shared
//! and personal exercise catalog, workout plans, and logged workouts with
//! resumable in-progress state.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use services::{Mailer, SessionManager};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn Store>,
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(config: Config, db: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        let sessions = SessionManager::new(&config, db.clone(), mailer);
        Self {
            config,
            db,
            sessions,
        }
    }
}
