//! User-bound email verification tokens.
//!
//! A token is `"{issued_at in base36}-{truncated HMAC}"`. The MAC covers the
//! user's id, email and verification state, so a token stops validating as
//! soon as the account is verified or its email changes.

use axum::extract::FromRef;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::repo_types::User;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

const KEY_SALT: &str = "authors-haven.auth.email-verification";
const MAC_BYTES: usize = 16;
// Tolerated clock skew for timestamps from the future.
const MAX_SKEW_SECS: i64 = 60;

#[derive(Clone)]
pub struct VerificationTokens {
    key: Vec<u8>,
    ttl: Duration,
}

impl VerificationTokens {
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        Self {
            key: format!("{}{}", KEY_SALT, secret).into_bytes(),
            ttl: Duration::days(ttl_days),
        }
    }

    pub fn make_token(&self, user: &User, now: OffsetDateTime) -> anyhow::Result<String> {
        let ts = now.unix_timestamp().max(0) as u64;
        let mut mac = HmacSha256::new_from_slice(&self.key)?;
        mac.update(message(user, ts).as_bytes());
        let tag = mac.finalize().into_bytes();
        Ok(format!("{}-{}", to_base36(ts), hex::encode(&tag[..MAC_BYTES])))
    }

    pub fn check_token(&self, user: &User, token: &str, now: OffsetDateTime) -> bool {
        let Some((ts_part, mac_part)) = token.split_once('-') else {
            return false;
        };
        let Ok(ts) = u64::from_str_radix(ts_part, 36) else {
            return false;
        };
        let Ok(issued_at) = i64::try_from(ts) else {
            return false;
        };
        let age = now.unix_timestamp() - issued_at;
        if age < -MAX_SKEW_SECS || age > self.ttl.whole_seconds() {
            return false;
        }
        let Ok(given) = hex::decode(mac_part) else {
            return false;
        };
        if given.len() != MAC_BYTES {
            return false;
        }
        let Ok(mut mac) = HmacSha256::new_from_slice(&self.key) else {
            return false;
        };
        mac.update(message(user, ts).as_bytes());
        mac.verify_truncated_left(&given).is_ok()
    }
}

impl FromRef<AppState> for VerificationTokens {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            &state.config.jwt.secret,
            state.config.tokens.verification_ttl_days,
        )
    }
}

fn message(user: &User, ts: u64) -> String {
    format!("{}|{}|{}|{}", user.id, user.email, user.is_verified, ts)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// URL-safe base64 of the user id, as used in verification links.
pub fn encode_uid(id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

pub fn decode_uid(uidb64: &str) -> Option<Uuid> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64.trim_end_matches('=')).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    Uuid::parse_str(&text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            username: "ada".into(),
            password_hash: "x".into(),
            is_verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn base36_matches_std_parser() {
        for n in [0u64, 1, 35, 36, 1_700_000_000, u64::MAX] {
            assert_eq!(u64::from_str_radix(&to_base36(n), 36).unwrap(), n);
        }
    }

    #[test]
    fn fresh_token_checks_out() {
        let tokens = VerificationTokens::new("secret", 7);
        let user = user();
        let now = OffsetDateTime::now_utc();
        let token = tokens.make_token(&user, now).unwrap();
        assert!(tokens.check_token(&user, &token, now));
        assert!(tokens.check_token(&user, &token, now + Duration::days(6)));
    }

    #[test]
    fn token_expires_after_ttl() {
        let tokens = VerificationTokens::new("secret", 7);
        let user = user();
        let now = OffsetDateTime::now_utc();
        let token = tokens.make_token(&user, now).unwrap();
        assert!(!tokens.check_token(&user, &token, now + Duration::days(8)));
    }

    #[test]
    fn token_is_bound_to_user_state() {
        let tokens = VerificationTokens::new("secret", 7);
        let mut user = user();
        let now = OffsetDateTime::now_utc();
        let token = tokens.make_token(&user, now).unwrap();

        let other = super::tests::user();
        assert!(!tokens.check_token(&other, &token, now));

        user.is_verified = true;
        assert!(!tokens.check_token(&user, &token, now));
    }

    #[test]
    fn token_rejects_other_secret_and_garbage() {
        let tokens = VerificationTokens::new("secret", 7);
        let other = VerificationTokens::new("another", 7);
        let user = user();
        let now = OffsetDateTime::now_utc();
        let token = tokens.make_token(&user, now).unwrap();
        assert!(!other.check_token(&user, &token, now));
        assert!(!tokens.check_token(&user, "", now));
        assert!(!tokens.check_token(&user, "no-dash-here-zz", now));
        assert!(!tokens.check_token(&user, "abc-nothex", now));
        assert!(!tokens.check_token(&user, &format!("{}00", token), now));
    }

    #[test]
    fn uid_roundtrip_and_tampering() {
        let id = Uuid::new_v4();
        assert_eq!(decode_uid(&encode_uid(id)), Some(id));
        assert_eq!(decode_uid("%%%not-base64"), None);
        // valid base64 but not a uuid
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode("42")), None);
    }
}
