// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed token issuance and verification.
//!
//! Access, refresh and email-verification tokens are HS256 JWTs, each
//! signed with its own secret and carrying its kind in `typ`, so a token
//! of one kind never verifies as another.

use crate::config::Config;
use crate::error::AppError;
use crate::time_utils::{from_unix_seconds, unix_now};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
    EmailVerification,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::EmailVerification => "email-verification",
        }
    }
}

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Unique per token, so two tokens minted in the same second differ
    pub jti: String,
    /// Token kind, see [`TokenKind::as_str`]
    pub typ: String,
    /// Only on email-verification tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        from_unix_seconds(self.exp)
    }
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token invalid")]
    Invalid,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Invalid => AppError::TokenInvalid,
        }
    }
}

struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningKey {
    fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }
}

/// Issues and verifies all token kinds. Built once from [`Config`].
pub struct TokenIssuer {
    access: SigningKey,
    refresh: SigningKey,
    verification: SigningKey,
    validation: Validation,
}

impl TokenIssuer {
    pub fn new(config: &Config) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            access: SigningKey::new(&config.jwt_access_secret, config.access_token_ttl),
            refresh: SigningKey::new(&config.jwt_refresh_secret, config.refresh_token_ttl),
            verification: SigningKey::new(
                &config.email_verification_secret,
                config.verification_token_ttl,
            ),
            validation,
        }
    }

    fn key(&self, kind: TokenKind) -> &SigningKey {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
            TokenKind::EmailVerification => &self.verification,
        }
    }

    /// Lifetime of access tokens in seconds (`expiresIn`).
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access.ttl.num_seconds()
    }

    fn issue(
        &self,
        kind: TokenKind,
        user_id: &str,
        email: Option<String>,
    ) -> Result<IssuedToken, AppError> {
        let key = self.key(kind);
        let now = unix_now();
        let exp = now + key.ttl.num_seconds().max(0) as usize;

        let claims = Claims {
            sub: user_id.to_string(),
            exp,
            iat: now,
            jti: uuid::Uuid::new_v4().simple().to_string(),
            typ: kind.as_str().to_string(),
            email,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &key.encoding)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Token signing failed: {}", e)))?;

        Ok(IssuedToken {
            token,
            expires_at: claims.expires_at(),
        })
    }

    pub fn issue_access(&self, user_id: &str) -> Result<IssuedToken, AppError> {
        self.issue(TokenKind::Access, user_id, None)
    }

    pub fn issue_refresh(&self, user_id: &str) -> Result<IssuedToken, AppError> {
        self.issue(TokenKind::Refresh, user_id, None)
    }

    pub fn issue_verification(&self, user_id: &str, email: &str) -> Result<IssuedToken, AppError> {
        self.issue(
            TokenKind::EmailVerification,
            user_id,
            Some(email.to_string()),
        )
    }

    /// Verify signature, expiry and kind.
    pub fn verify(&self, kind: TokenKind, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.key(kind).decoding, &self.validation).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            },
        )?;

        if data.claims.typ != kind.as_str() {
            return Err(TokenError::Invalid);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&Config::test_default())
    }

    #[test]
    fn test_access_roundtrip() {
        let issuer = issuer();
        let issued = issuer.issue_access("user-1").unwrap();
        let claims = issuer.verify(TokenKind::Access, &issued.token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.typ, "access");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn test_kinds_do_not_cross_verify() {
        let issuer = issuer();
        let refresh = issuer.issue_refresh("user-1").unwrap();
        assert_eq!(
            issuer.verify(TokenKind::Access, &refresh.token),
            Err(TokenError::Invalid)
        );
        let access = issuer.issue_access("user-1").unwrap();
        assert_eq!(
            issuer.verify(TokenKind::Refresh, &access.token),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_same_second_tokens_differ() {
        let issuer = issuer();
        let a = issuer.issue_refresh("user-1").unwrap();
        let b = issuer.issue_refresh("user-1").unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_expired_is_distinguished() {
        let config = Config::test_default();
        let claims = Claims {
            sub: "user-1".into(),
            exp: unix_now() - 10,
            iat: unix_now() - 100,
            jti: "x".into(),
            typ: "access".into(),
            email: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&config.jwt_access_secret),
        )
        .unwrap();
        assert_eq!(
            issuer().verify(TokenKind::Access, &token),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert_eq!(
            issuer().verify(TokenKind::Access, "not.a.jwt"),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn test_verification_token_carries_email() {
        let issuer = issuer();
        let issued = issuer.issue_verification("user-1", "a@x.com").unwrap();
        let claims = issuer
            .verify(TokenKind::EmailVerification, &issued.token)
            .unwrap();
        assert_eq!(claims.email.as_deref(), Some("a@x.com"));
        assert_eq!(claims.typ, "email-verification");
    }
}
