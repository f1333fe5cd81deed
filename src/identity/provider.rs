use std::sync::Arc;

use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::security::verify_password;

use super::lookup::{IdentityLookup, LookupError};
use super::principal::Principal;
use super::token::{BearerToken, TokenCodec};

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub token: BearerToken,
    pub principal: Principal,
}

pub trait AuthProvider: Send + Sync {
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse>;
}

/// Email/password login against the user store; a success issues a bearer token.
pub struct LocalAuthProvider {
    lookup: IdentityLookup,
    codec: Arc<TokenCodec>,
}

impl LocalAuthProvider {
    pub fn new(lookup: IdentityLookup, codec: Arc<TokenCodec>) -> Self { Self { lookup, codec } }
}

fn bad_credentials() -> AppError { AppError::auth("bad_credentials", "Bad credentials") }

impl AuthProvider for LocalAuthProvider {
    fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        let principal = match self.lookup.resolve(&req.email) {
            Ok(p) => p,
            Err(LookupError::NotFound(_)) => return Err(bad_credentials()),
            Err(e) => {
                error!("login lookup failed: {e}");
                return Err(AppError::io("store_unavailable", "user store unavailable"));
            }
        };
        if !verify_password(&principal.credential_hash, &req.password) {
            return Err(bad_credentials());
        }
        let token = self.codec.issue(&principal).map_err(|e| AppError::internal("token_error".to_string(), e.to_string()))?;
        info!(target: "yoga_app::auth", user_id = principal.id, "login");
        Ok(LoginResponse { token, principal })
    }
}
