// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token blacklist records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a token string, used as the blacklist document ID.
///
/// Raw tokens are never persisted in the blacklist.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// A token suppressed until its natural expiry.
///
/// Stored in `token_blacklist`, keyed by `token_hash`. A Firestore TTL
/// policy on `expires_at` removes the document after expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub token_hash: String,
    #[serde(with = "firestore::serialize_as_timestamp")]
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl BlacklistEntry {
    /// Blacklist `token` until `expires_at` (the token's own `exp`).
    pub fn new(token: &str, expires_at: DateTime<Utc>) -> Self {
        Self {
            token_hash: hash_token(token),
            expires_at,
            created_at: Utc::now(),
        }
    }

    /// Whether the entry still suppresses its token at `now`.
    ///
    /// A token still verifies during the second named by its `exp`, so the
    /// entry stays active through that second as well. TTL deletion can lag,
    /// so lookups check expiry themselves.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() <= self.expires_at.timestamp()
    }
}
