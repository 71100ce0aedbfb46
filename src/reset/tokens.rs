//! Signed, time-limited tokens that carry a subject (the user's email).
//!
//! Tokens are HS256 JWTs with a `purpose` claim, so a session token signed
//! with the same secret is never accepted as a reset token.

use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::state::AppState;

pub const DEFAULT_TTL: Duration = Duration::days(7);
pub const PASSWORD_RESET: &str = "password-reset";

#[derive(Debug, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    iat: i64,
    exp: i64,
    jti: Uuid,
    purpose: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,
    #[error("token is malformed")]
    Malformed,
    #[error("token could not be signed")]
    Signing,
}

#[derive(Clone)]
pub struct TokenHandler {
    encoding: EncodingKey,
    decoding: DecodingKey,
    purpose: &'static str,
    ttl: Duration,
}

impl TokenHandler {
    pub fn new(secret: &str, purpose: &'static str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            purpose,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        self.issue_at(subject, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, subject: &str, now: OffsetDateTime) -> Result<String, TokenError> {
        let claims = TokenClaims {
            sub: subject.to_string(),
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
            jti: Uuid::new_v4(),
            purpose: self.purpose.to_string(),
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|_| TokenError::Signing)
    }

    /// Returns the subject of a valid token.
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<TokenClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;
        if data.claims.purpose != self.purpose {
            return Err(TokenError::Malformed);
        }
        Ok(data.claims.sub)
    }
}

impl FromRef<AppState> for TokenHandler {
    fn from_ref(state: &AppState) -> Self {
        Self::new(&state.config.jwt.secret, PASSWORD_RESET)
            .with_ttl(Duration::minutes(state.config.tokens.reset_ttl_minutes))
    }
}
