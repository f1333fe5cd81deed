//! Bearer-token identity for the yoga studio API.
//! Keep the public surface thin and split implementation across sub-modules:
//! token signing, identity lookup, the per-request context, the request
//! authenticator middleware and the login provider.

mod principal;
mod token;
mod lookup;
mod request_context;
mod authenticator;
mod provider;

pub use principal::Principal;
pub use token::{BearerToken, Claims, TokenCodec, TokenError, MAX_TOKEN_TTL, TOKEN_ALGORITHM};
pub use lookup::{IdentityLookup, LookupError};
pub use request_context::AuthenticatedContext;
pub use authenticator::{AuthState, RequestAuthenticator, authenticate_request, bearer_token};
pub use provider::{AuthProvider, LocalAuthProvider, LoginRequest, LoginResponse};
