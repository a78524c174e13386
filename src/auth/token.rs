//! Token manager: HS256 access tokens and opaque refresh tokens.
//!
//! Access tokens are JWTs carrying `sub` (user id), `iss`, `exp`, `iat` and a
//! random `jti`.  Verification accepts HS256 only; the `alg` in the token
//! header is checked against that allow-list and never used to pick a key.
//!
//! Refresh tokens are 32 random bytes, base64url without padding.  Only
//! their SHA-256 digest ([`refresh_digest`]) is ever persisted.

use std::fmt;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::random::RandomSource;
use crate::domain::UserId;
use crate::error::ServiceError;

const ALGORITHM: Algorithm = Algorithm::HS256;
/// Bytes of entropy in a refresh token.
pub const REFRESH_TOKEN_BYTES: usize = 32;
/// Keys shorter than this still work but are logged as weak.
const RECOMMENDED_KEY_BYTES: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("bad token signature")]
    BadSignature,

    #[error("token algorithm is not allowed")]
    DisallowedAlgorithm,

    #[error("token issuer does not match")]
    WrongIssuer,

    #[error("token subject is missing or not a user id")]
    InvalidSubject,

    #[error("signing failed: {0}")]
    Signing(String),
}

impl From<TokenError> for ServiceError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(msg) => ServiceError::Signing(msg),
            _ => ServiceError::InvalidToken,
        }
    }
}

/// Issuer name and lifetimes.  Read-only after startup.
#[derive(Debug, Clone)]
pub struct TokenSettings {
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            issuer: "todokeep".to_string(),
            access_ttl: Duration::minutes(5),
            refresh_ttl: Duration::days(14),
        }
    }
}

/// Outcome of verifying a well-formed, correctly signed access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub user_id: UserId,
    /// `false` once the token is past its expiry.
    pub valid: bool,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    iss: String,
    exp: i64,
    iat: i64,
    jti: String,
}

pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    settings: TokenSettings,
    random: Arc<dyn RandomSource>,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("issuer", &self.settings.issuer)
            .field("access_ttl", &self.settings.access_ttl)
            .field("refresh_ttl", &self.settings.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Fails with [`TokenError::Signing`] when the key is empty.
    pub fn new(
        key: &[u8],
        settings: TokenSettings,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, TokenError> {
        if key.is_empty() {
            return Err(TokenError::Signing("signing key is empty".into()));
        }
        if key.len() < RECOMMENDED_KEY_BYTES {
            warn!(key_bytes = key.len(), "signing key is shorter than {RECOMMENDED_KEY_BYTES} bytes");
        }

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        // Expiry is reported through `Verification::valid`, not as an error.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_issuer(&[settings.issuer.as_str()]);

        Ok(Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
            settings,
            random,
        })
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    pub fn issue_access_token(&self, user_id: UserId) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = AccessClaims {
            sub: Some(user_id.to_string()),
            iss: self.settings.issuer.clone(),
            exp: (now + self.settings.access_ttl).timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Returns the token and its expiry.  The caller persists only
    /// [`refresh_digest`] of the token.
    pub fn issue_refresh_token(&self, user_id: UserId) -> Result<(String, DateTime<Utc>), TokenError> {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        self.random.fill(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);
        let expires_at = Utc::now() + self.settings.refresh_ttl;
        debug!(user_id = %user_id, %expires_at, "refresh token issued");
        Ok((token, expires_at))
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Verification, TokenError> {
        let data = decode::<AccessClaims>(token, &self.decoding, &self.validation)
            .map_err(classify)?;
        let claims = data.claims;

        let user_id = claims
            .sub
            .as_deref()
            .and_then(|s| s.parse::<UserId>().ok())
            .ok_or(TokenError::InvalidSubject)?;

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
            .ok_or_else(|| TokenError::Malformed(format!("exp out of range: {}", claims.exp)))?;

        Ok(Verification {
            user_id,
            valid: Utc::now() < expires_at,
            expires_at,
        })
    }
}

/// SHA-256 of a refresh token, hex-encoded.  This is the value the
/// credential store indexes.
pub fn refresh_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn classify(e: jsonwebtoken::errors::Error) -> TokenError {
    match e.kind() {
        ErrorKind::InvalidSignature => TokenError::BadSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            TokenError::DisallowedAlgorithm
        }
        ErrorKind::InvalidIssuer => TokenError::WrongIssuer,
        ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => TokenError::WrongIssuer,
        _ => TokenError::Malformed(e.to_string()),
    }
}
