use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{non_empty, UserId};
use crate::error::ServiceError;

/// The stored half of a refresh token: its SHA-256 digest and expiry.
///
/// Each user holds at most one grant.  A new login overwrites it, which is
/// how earlier sessions are invalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshGrant {
    pub token_digest: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    id: UserId,
    name: String,
    /// PHC-format Argon2id hash.
    password_hash: String,
    #[serde(default)]
    refresh: Option<RefreshGrant>,
}

impl User {
    pub fn new(id: UserId, name: &str, password_hash: String) -> Result<Self, ServiceError> {
        if id.is_nil() {
            return Err(ServiceError::InvalidArgument("user id must not be nil".into()));
        }
        let name = non_empty("user name", name)?;
        if password_hash.is_empty() {
            return Err(ServiceError::InvalidArgument("password hash must not be empty".into()));
        }
        Ok(Self { id, name, password_hash, refresh: None })
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn refresh(&self) -> Option<&RefreshGrant> {
        self.refresh.as_ref()
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_password_hash(&mut self, hash: String) {
        self.password_hash = hash;
    }

    pub(crate) fn set_refresh(&mut self, grant: Option<RefreshGrant>) {
        self.refresh = grant;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn new_user_has_no_refresh_grant() {
        let u = User::new(UserId::new(), "alice", "$argon2id$x".into()).unwrap();
        assert_eq!(u.name(), "alice");
        assert!(u.refresh().is_none());
    }

    #[test]
    fn name_is_trimmed() {
        let u = User::new(UserId::new(), "  bob ", "$argon2id$x".into()).unwrap();
        assert_eq!(u.name(), "bob");
    }

    #[test]
    fn blank_name_is_rejected() {
        let err = User::new(UserId::new(), "   ", "$argon2id$x".into()).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));
    }

    #[test]
    fn nil_id_is_rejected() {
        let nil = UserId::from_uuid(Uuid::nil());
        assert!(User::new(nil, "carol", "$argon2id$x".into()).is_err());
    }
}
