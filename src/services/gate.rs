//! Access gate: bearer token to user id, then ownership checks.
//!
//! Every privileged operation passes through here before touching the store.
//! Authorization failures and missing resources are reported separately:
//! a list that exists but belongs to someone else is [`ServiceError::AccessDenied`],
//! a list that does not exist at all is `NotFound(list)`.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::auth::TokenManager;
use crate::domain::{List, ListId, ItemId, UserId};
use crate::error::{Resource, ServiceError};
use crate::store::StoreHandle;

#[derive(Clone)]
pub struct AccessGate {
    tokens: Arc<TokenManager>,
    store: StoreHandle,
}

impl AccessGate {
    pub fn new(tokens: Arc<TokenManager>, store: StoreHandle) -> Self {
        Self { tokens, store }
    }

    /// Resolve a bearer token.  Any verification failure is `InvalidToken`;
    /// a correctly signed but expired token is `TokenExpired`.
    pub fn authenticate(&self, token: &str) -> Result<UserId, ServiceError> {
        let verification = self.tokens.verify_access_token(token).map_err(|e| {
            debug!(error = %e, "access token rejected");
            ServiceError::InvalidToken
        })?;
        if !verification.valid {
            debug!(user_id = %verification.user_id, "access token expired");
            return Err(ServiceError::TokenExpired);
        }
        Ok(verification.user_id)
    }

    /// Load a list on behalf of `user`.
    pub async fn authorize_list(&self, user: UserId, list_id: ListId) -> Result<List, ServiceError> {
        let list = self.store.get_list(list_id).await?;
        if list.owner() != user {
            warn!(user_id = %user, list_id = %list_id, "list access denied");
            return Err(ServiceError::AccessDenied);
        }
        Ok(list)
    }

    /// Confirm `user` owns `list_id` and that `item_id` belongs to it.
    ///
    /// Ownership is checked against the caller's owned list ids, so the cost
    /// is linear in the number of lists the user has.
    pub async fn authorize_item(
        &self,
        user: UserId,
        list_id: ListId,
        item_id: ItemId,
    ) -> Result<List, ServiceError> {
        let owned = self.store.list_ids_by_owner(user).await?;
        if !owned.contains(&list_id) {
            return match self.store.get_list(list_id).await {
                Ok(_) => {
                    warn!(user_id = %user, list_id = %list_id, item_id = %item_id, "item access denied");
                    Err(ServiceError::AccessDenied)
                }
                Err(ServiceError::NotFound(_)) => Err(ServiceError::NotFound(Resource::List)),
                Err(e) => Err(e),
            };
        }

        let list = self.store.get_list(list_id).await?;
        if !list.contains(item_id) {
            return Err(ServiceError::NotFound(Resource::Item));
        }
        Ok(list)
    }
}
