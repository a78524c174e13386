//! Session service: registration, login, token renewal and account upkeep.
//!
//! A user holds at most one refresh grant.  Each login overwrites it, so a
//! second login invalidates the refresh token handed out by the first.
//! Logout and account deletion clear it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::gate::AccessGate;
use crate::auth::password::{check_strength, hash_password, verify_password};
use crate::auth::{refresh_digest, TokenManager};
use crate::domain::{non_empty, RefreshGrant, User, UserId};
use crate::error::ServiceError;
use crate::store::StoreHandle;

/// Tokens handed to a client when a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionService {
    gate: AccessGate,
    tokens: Arc<TokenManager>,
    store: StoreHandle,
}

impl SessionService {
    pub fn new(gate: AccessGate, tokens: Arc<TokenManager>, store: StoreHandle) -> Self {
        Self { gate, tokens, store }
    }

    /// Create an account and open its first session.
    pub async fn register(&self, name: &str, password: &str) -> Result<TokenPair, ServiceError> {
        let name = non_empty("user name", name)?;
        check_strength(password)?;

        match self.store.get_user_id_by_name(&name).await {
            Ok(_) => return Err(ServiceError::AlreadyExists(format!("user name '{name}'"))),
            Err(ServiceError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let hash = hash_blocking(password.to_string()).await?;
        let user = User::new(UserId::new(), &name, hash)?;
        let user_id = user.id();
        // The store re-checks the name, so a concurrent registration still fails cleanly.
        self.store.create_user(user).await?;
        info!(user_id = %user_id, "user registered");

        self.start_session(user_id).await
    }

    /// Unknown names and wrong passwords both fail with `LoginFailed`.
    pub async fn login(&self, name: &str, password: &str) -> Result<TokenPair, ServiceError> {
        let user_id = match self.store.get_user_id_by_name(name.trim()).await {
            Ok(id) => id,
            Err(ServiceError::NotFound(_)) => {
                debug!("login failed: unknown user name");
                return Err(ServiceError::LoginFailed);
            }
            Err(e) => return Err(e),
        };
        let user = match self.store.get_user(user_id).await {
            Ok(user) => user,
            Err(ServiceError::NotFound(_)) => return Err(ServiceError::LoginFailed),
            Err(e) => return Err(e),
        };

        if !verify_blocking(password.to_string(), user.password_hash().to_string()).await? {
            warn!(user_id = %user_id, "login failed: wrong password");
            return Err(ServiceError::LoginFailed);
        }

        let pair = self.start_session(user_id).await?;
        info!(user_id = %user_id, "user logged in");
        Ok(pair)
    }

    /// Drop the account and every list it owns.
    ///
    /// List removal is best-effort: a list that cannot be enumerated or
    /// deleted is logged and skipped.  Only a failure to delete the user
    /// record is returned.
    pub async fn delete_account(&self, access_token: &str) -> Result<(), ServiceError> {
        let user_id = self.gate.authenticate(access_token)?;

        match self.store.list_ids_by_owner(user_id).await {
            Ok(list_ids) => {
                for list_id in list_ids {
                    if let Err(e) = self.store.delete_list(list_id).await {
                        warn!(user_id = %user_id, list_id = %list_id, error = %e, "could not delete list; continuing");
                    }
                }
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "could not enumerate lists; deleting account anyway");
            }
        }

        self.store.delete_user(user_id).await?;
        info!(user_id = %user_id, "account deleted");
        Ok(())
    }

    /// Clear the stored refresh grant.  The access token stays valid until it
    /// expires.
    pub async fn logout(&self, access_token: &str) -> Result<(), ServiceError> {
        let user_id = self.gate.authenticate(access_token)?;
        self.store.set_refresh_grant(user_id, None).await?;
        info!(user_id = %user_id, "user logged out");
        Ok(())
    }

    /// Exchange a refresh token for a new access token.  The refresh token
    /// itself is not rotated.
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, ServiceError> {
        if refresh_token.is_empty() {
            return Err(ServiceError::InvalidToken);
        }

        let (user_id, expires_at) = match self
            .store
            .get_user_by_refresh_digest(refresh_digest(refresh_token))
            .await
        {
            Ok(found) => found,
            Err(ServiceError::NotFound(_)) => {
                debug!("refresh token not recognised");
                return Err(ServiceError::InvalidToken);
            }
            Err(e) => return Err(e),
        };

        // Expired once now is strictly past the stored expiry.
        if Utc::now() > expires_at {
            debug!(user_id = %user_id, %expires_at, "refresh token expired");
            return Err(ServiceError::TokenExpired);
        }

        Ok(self.tokens.issue_access_token(user_id)?)
    }

    /// A weak password leaves the stored hash untouched.
    pub async fn update_password(&self, access_token: &str, new_password: &str) -> Result<(), ServiceError> {
        let user_id = self.gate.authenticate(access_token)?;
        check_strength(new_password)?;
        let hash = hash_blocking(new_password.to_string()).await?;
        self.store.update_password(user_id, hash).await?;
        info!(user_id = %user_id, "password updated");
        Ok(())
    }

    pub async fn update_name(&self, access_token: &str, new_name: &str) -> Result<(), ServiceError> {
        let user_id = self.gate.authenticate(access_token)?;
        let name = non_empty("user name", new_name)?;
        self.store.update_name(user_id, name).await?;
        info!(user_id = %user_id, "display name updated");
        Ok(())
    }

    pub async fn get_display_name(&self, access_token: &str) -> Result<String, ServiceError> {
        let user_id = self.gate.authenticate(access_token)?;
        let user = self.store.get_user(user_id).await?;
        Ok(user.name().to_string())
    }

    async fn start_session(&self, user_id: UserId) -> Result<TokenPair, ServiceError> {
        let access_token = self.tokens.issue_access_token(user_id)?;
        let (refresh_token, refresh_expires_at) = self.tokens.issue_refresh_token(user_id)?;
        let grant = RefreshGrant {
            token_digest: refresh_digest(&refresh_token),
            expires_at: refresh_expires_at,
        };
        self.store.set_refresh_grant(user_id, Some(grant)).await?;
        Ok(TokenPair { access_token, refresh_token, refresh_expires_at })
    }
}

// Argon2 runs on the blocking pool.

async fn hash_blocking(password: String) -> Result<String, ServiceError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| ServiceError::PasswordHash(format!("hash task: {e}")))?
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, ServiceError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| ServiceError::PasswordHash(format!("verify task: {e}")))?
}
