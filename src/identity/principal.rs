use std::fmt;

/// The identity a request acts as once its bearer token checks out.
/// Built from a stored user and never mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    /// Unique login key (the member's email); also the token subject.
    pub login_key: String,
    pub first_name: String,
    pub last_name: String,
    pub admin: bool,
    pub credential_hash: String,
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("login_key", &self.login_key)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("admin", &self.admin)
            .field("credential_hash", &"[REDACTED]")
            .finish()
    }
}
