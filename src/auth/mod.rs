//! Credentials: password hashing, token issuance and verification.
//!
//! - [`TokenManager`]: HS256 access tokens, opaque refresh tokens
//! - [`password`]: Argon2id hash/verify plus the minimum-length policy
//! - [`RandomSource`]: entropy capability injected into the token manager

pub mod password;
pub mod random;
pub mod token;

pub use random::{OsRandom, RandomSource};
pub use token::{refresh_digest, TokenError, TokenManager, TokenSettings, Verification};
