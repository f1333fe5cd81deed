use super::Principal;
use crate::error::{AppError, AppResult};

/// Per-request authentication outcome. Created by the request authenticator,
/// carried in the request extensions and dropped with the request.
#[derive(Debug, Clone, Default)]
pub struct AuthenticatedContext {
    pub principal: Option<Principal>,
    pub request_id: Option<String>,
}

impl AuthenticatedContext {
    pub fn anonymous() -> Self { Self::default() }

    pub fn is_authenticated(&self) -> bool { self.principal.is_some() }

    pub fn principal(&self) -> Option<&Principal> { self.principal.as_ref() }

    /// Protected handlers call this; an anonymous request answers 401.
    pub fn require(&self) -> AppResult<&Principal> {
        self.principal
            .as_ref()
            .ok_or_else(|| AppError::auth("unauthorized", "Full authentication is required to access this resource"))
    }
}
