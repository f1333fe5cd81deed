use thiserror::Error;
use tracing::debug;

use super::principal::Principal;
use crate::storage::{SharedEntityStore, StoreError, User};

/// `NotFound` means "no such member" and ends an authentication attempt quietly;
/// `Store` is a failure of the backing store and is worth logging.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no user with login '{0}'")]
    NotFound(String),

    #[error("stored user '{0}' has no id")]
    Unidentified(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves a login key (email) to a `Principal` through the user store.
#[derive(Clone)]
pub struct IdentityLookup {
    users: SharedEntityStore<User>,
}

impl IdentityLookup {
    pub fn new(users: SharedEntityStore<User>) -> Self { Self { users } }

    pub fn resolve(&self, login_key: &str) -> Result<Principal, LookupError> {
        let Some(user) = self.users.find_by_unique_key(login_key)? else {
            debug!(target: "yoga_app::identity", login_key, "lookup: not found");
            return Err(LookupError::NotFound(login_key.to_string()));
        };
        let Some(id) = user.id else { return Err(LookupError::Unidentified(user.email)); };
        Ok(Principal {
            id,
            login_key: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            admin: user.admin,
            credential_hash: user.password,
        })
    }
}
