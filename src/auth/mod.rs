use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::database::models::PlatformUser;

const SECRET_BYTES: usize = 32;

/// Claims of a platform session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Platform account id (hex)
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user: &PlatformUser, expiry_hours: u64) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id.to_hex(),
            email: user.email.clone(),
            is_admin: user.is_admin,
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,
}

pub fn generate_jwt(claims: &Claims, security: &SecurityConfig) -> Result<String, JwtError> {
    if security.jwt_secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(security.jwt_secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn verify_jwt(token: &str, security: &SecurityConfig) -> Result<Claims, JwtError> {
    if security.jwt_secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(security.jwt_secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::Invalid,
        })
}

/// 32 random bytes, hex encoded. Used for API keys and per-schema signing secrets.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// A malformed stored hash counts as a mismatch
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!("Stored password hash could not be verified: {}", e);
            false
        }
    }
}

/// One throwaway hash per bcrypt cost, built on first use
static DECOY_HASHES: Lazy<Mutex<HashMap<u32, String>>> = Lazy::new(Default::default);

/// Spend one bcrypt verification when no account matched, so an unknown
/// identity takes as long to reject as a wrong password.
pub fn verify_against_decoy(password: &str, cost: u32) {
    let decoy = {
        let mut hashes = DECOY_HASHES.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        hashes
            .entry(cost)
            .or_insert_with(|| bcrypt::hash(generate_secret(), cost).unwrap_or_default())
            .clone()
    };
    if !decoy.is_empty() {
        let _ = bcrypt::verify(password, &decoy);
    }
}

/// Extract a bearer token from an Authorization header value
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
