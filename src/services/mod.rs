// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod entitlements;
pub mod mailer;
pub mod password;
pub mod sessions;
pub mod tokens;

pub use entitlements::{DeleteAction, EditAction, ExerciseView, Viewer};
pub use mailer::{EmailMessage, HttpMailer, LogMailer, Mailer};
pub use sessions::{AuthUser, PresentedToken, SessionManager};
pub use tokens::{TokenIssuer, TokenKind};
