//! Domain records: users, lists and items.
//!
//! Plain value records.  Constructors enforce the invariants (non-empty
//! names, a real owner id); fields are read through accessors so a record
//! cannot drift out of shape after construction.

mod ids;
mod todo;
mod user;

pub use ids::{ItemId, ListId, UserId};
pub use todo::{Item, List};
pub use user::{RefreshGrant, User};

use crate::error::ServiceError;

/// Trim `value` and reject it if nothing is left.
pub(crate) fn non_empty(field: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidArgument(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}
