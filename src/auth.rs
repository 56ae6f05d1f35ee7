//! Password hashing and access tokens.
//!
//! Tokens are HS256 JWTs carrying the user's email and an expiry; they
//! are opaque to clients and verified on every authenticated route.
//! Passwords are stored as `base64(salt)$base64(hash)` with an iterated
//! salted SHA-256 digest.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

const SALT_LEN: usize = 16;
const HASH_ITERATIONS: u32 = 10_000;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not validate credentials")]
    InvalidToken,
    #[error("token creation failed: {0}")]
    TokenCreation(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// The authenticated user's email.
    sub: String,
    /// Expiry as a unix timestamp; validated on decode.
    exp: usize,
}

/// Mint an access token for `email`, valid for `ttl_minutes`.
pub fn create_access_token(
    email: &str,
    secret: &str,
    ttl_minutes: i64,
) -> Result<String, AuthError> {
    let expires = Utc::now() + Duration::minutes(ttl_minutes);
    let claims = Claims {
        sub: email.to_string(),
        exp: expires.timestamp().max(0) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AuthError::TokenCreation(e.to_string()))
}

/// Verify a token and return the email it was minted for.
///
/// Expired, tampered, or foreign-key tokens all collapse into the same
/// `InvalidToken` error; callers have no reason to distinguish them.
pub fn verify_access_token(token: &str, secret: &str) -> Result<String, AuthError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AuthError::InvalidToken)?;
    Ok(data.claims.sub)
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = digest_password(password, &salt);
    format!("{}${}", BASE64.encode(salt), BASE64.encode(digest))
}

/// Check a password against a stored `salt$hash` string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_b64, hash_b64)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (BASE64.decode(salt_b64), BASE64.decode(hash_b64)) else {
        return false;
    };
    let actual = digest_password(password, &salt);
    constant_time_eq(&actual, &expected)
}

fn digest_password(password: &str, salt: &[u8]) -> Vec<u8> {
    let mut digest = {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hasher.finalize().to_vec()
    };
    for _ in 1..HASH_ITERATIONS {
        let mut hasher = Sha256::new();
        hasher.update(&digest);
        hasher.update(salt);
        digest = hasher.finalize().to_vec();
    }
    digest
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn test_token_round_trip() {
        let token = create_access_token("user@example.com", SECRET, 15).unwrap();
        let email = verify_access_token(&token, SECRET).unwrap();
        assert_eq!(email, "user@example.com");
    }

    #[test]
    fn test_expired_token_rejected() {
        // Two minutes past expiry clears the default decode leeway.
        let token = create_access_token("user@example.com", SECRET, -2).unwrap();
        assert!(verify_access_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let token = create_access_token("user@example.com", SECRET, 15).unwrap();
        let mut tampered = token.into_bytes();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == b'A' { b'B' } else { b'A' };
        let tampered = String::from_utf8(tampered).unwrap();
        assert!(verify_access_token(&tampered, SECRET).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_access_token("user@example.com", SECRET, 15).unwrap();
        assert!(verify_access_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(verify_access_token("not-a-token", SECRET).is_err());
    }

    #[test]
    fn test_password_round_trip() {
        let stored = hash_password("hunter2");
        assert!(verify_password("hunter2", &stored));
        assert!(!verify_password("hunter3", &stored));
    }

    #[test]
    fn test_password_hashes_are_salted() {
        let a = hash_password("same password");
        let b = hash_password("same password");
        assert_ne!(a, b);
        assert!(verify_password("same password", &a));
        assert!(verify_password("same password", &b));
    }

    #[test]
    fn test_malformed_stored_hash_rejected() {
        assert!(!verify_password("anything", "no-dollar-sign"));
        assert!(!verify_password("anything", "!!$!!"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
