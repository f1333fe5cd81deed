//! Per-request bearer authentication.
//!
//! Every request walks `Start → HeaderCheck → TokenValidate → IdentityResolve →
//! Authenticated`, dropping to `Anonymous` at the first step that fails. The
//! outcome is an `AuthenticatedContext` stored in the request extensions; the
//! rest of the handler chain runs whatever the outcome. Store failures and
//! panics raised while validating or resolving are caught here, logged, and
//! count as anonymous.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use futures_util::FutureExt; // for catch_unwind on async blocks
use tracing::{debug, warn};

use super::lookup::{IdentityLookup, LookupError};
use super::principal::Principal;
use super::request_context::AuthenticatedContext;
use super::token::TokenCodec;

const BEARER_PREFIX: &str = "Bearer ";
const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Start,
    HeaderCheck,
    TokenValidate,
    IdentityResolve,
    Authenticated,
    Anonymous,
}

/// Token following a `Bearer ` authorization scheme, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix(BEARER_PREFIX)?.trim();
    if token.is_empty() { None } else { Some(token) }
}

#[derive(Clone)]
pub struct RequestAuthenticator {
    codec: Arc<TokenCodec>,
    lookup: IdentityLookup,
}

impl RequestAuthenticator {
    pub fn new(codec: Arc<TokenCodec>, lookup: IdentityLookup) -> Self { Self { codec, lookup } }

    pub async fn authenticate(&self, headers: &HeaderMap) -> AuthenticatedContext {
        let mut ctx = AuthenticatedContext::anonymous();
        ctx.request_id = headers.get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()).map(|s| s.to_string());
        let mut state = AuthState::Start;
        debug!(target: "yoga_app::auth", ?state, request_id = ?ctx.request_id);

        state = AuthState::HeaderCheck;
        let Some(token) = bearer_token(headers) else {
            debug!(target: "yoga_app::auth", from = ?state, to = ?AuthState::Anonymous, "no bearer authorization header");
            return ctx;
        };

        let attempt = AssertUnwindSafe(self.resolve_token(token)).catch_unwind().await;
        match attempt {
            Ok(Ok(Some(principal))) => {
                debug!(target: "yoga_app::auth", to = ?AuthState::Authenticated, user_id = principal.id, "request authenticated");
                ctx.principal = Some(principal);
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                warn!(target: "yoga_app::auth", error = %e, "cannot set user authentication; continuing anonymously");
            }
            Err(panic_payload) => {
                let msg = if let Some(s) = panic_payload.downcast_ref::<&str>() { *s }
                          else if let Some(s) = panic_payload.downcast_ref::<String>() { s.as_str() }
                          else { "panic" };
                warn!(target: "yoga_app::auth", panic = msg, "authentication panicked; continuing anonymously");
            }
        }
        ctx
    }

    /// `Ok(None)` is a quiet anonymous outcome, `Err` a transient failure.
    async fn resolve_token(&self, token: &str) -> Result<Option<Principal>, LookupError> {
        let mut state = AuthState::TokenValidate;
        if !self.codec.validate(token) {
            debug!(target: "yoga_app::auth", from = ?state, to = ?AuthState::Anonymous, "token rejected");
            return Ok(None);
        }
        // The token can expire between the two calls.
        let Ok(subject) = self.codec.subject_of(token) else {
            debug!(target: "yoga_app::auth", from = ?state, to = ?AuthState::Anonymous, "token expired during validation");
            return Ok(None);
        };

        state = AuthState::IdentityResolve;
        match self.lookup.resolve(&subject) {
            Ok(principal) => Ok(Some(principal)),
            Err(LookupError::NotFound(_)) => {
                debug!(target: "yoga_app::auth", from = ?state, to = ?AuthState::Anonymous, subject = %subject, "token subject is not a member");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Axum middleware: attach an `AuthenticatedContext` and always forward to `next`.
pub async fn authenticate_request(State(auth): State<RequestAuthenticator>, mut req: Request, next: Next) -> Response {
    let ctx = auth.authenticate(req.headers()).await;
    req.extensions_mut().insert(ctx);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{EntityStore, MemoryStore, StoreError, User};
    use axum::http::HeaderValue;
    use std::time::Duration;

    struct FailingStore;
    impl EntityStore<User> for FailingStore {
        fn find(&self, _id: i64) -> Result<Option<User>, StoreError> { Err(StoreError::Unavailable("down".into())) }
        fn find_all(&self) -> Result<Vec<User>, StoreError> { Err(StoreError::Unavailable("down".into())) }
        fn save(&self, _e: User) -> Result<User, StoreError> { Err(StoreError::Unavailable("down".into())) }
        fn delete(&self, _id: i64) -> Result<(), StoreError> { Err(StoreError::Unavailable("down".into())) }
        fn find_by_unique_key(&self, _k: &str) -> Result<Option<User>, StoreError> { Err(StoreError::Unavailable("down".into())) }
    }

    struct PanickingStore;
    impl EntityStore<User> for PanickingStore {
        fn find(&self, _id: i64) -> Result<Option<User>, StoreError> { panic!("JWT error") }
        fn find_all(&self) -> Result<Vec<User>, StoreError> { panic!("JWT error") }
        fn save(&self, _e: User) -> Result<User, StoreError> { panic!("JWT error") }
        fn delete(&self, _id: i64) -> Result<(), StoreError> { panic!("JWT error") }
        fn find_by_unique_key(&self, _k: &str) -> Result<Option<User>, StoreError> { panic!("JWT error") }
    }

    fn codec() -> Arc<TokenCodec> { Arc::new(TokenCodec::new("testSecret", Duration::from_secs(60))) }

    fn member_store() -> MemoryStore<User> {
        let users = MemoryStore::new();
        users.save(User::new("user@test.com", "Test", "User", "$argon2id$x", false)).unwrap();
        users
    }

    fn token_for(codec: &TokenCodec, login: &str) -> String {
        let p = Principal {
            id: 1,
            login_key: login.into(),
            first_name: String::new(),
            last_name: String::new(),
            admin: false,
            credential_hash: String::new(),
        };
        codec.issue(&p).unwrap()
    }

    fn headers_with(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        h
    }

    #[test]
    fn bearer_token_extraction() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers_with("InvalidHeader token")), None);
        assert_eq!(bearer_token(&headers_with("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn valid_token_authenticates() {
        let c = codec();
        let auth = RequestAuthenticator::new(c.clone(), IdentityLookup::new(Arc::new(member_store())));
        let token = token_for(&c, "user@test.com");
        let ctx = auth.authenticate(&headers_with(&format!("Bearer {token}"))).await;
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.principal().unwrap().login_key, "user@test.com");
    }

    #[tokio::test]
    async fn missing_header_is_anonymous() {
        let auth = RequestAuthenticator::new(codec(), IdentityLookup::new(Arc::new(member_store())));
        assert!(!auth.authenticate(&HeaderMap::new()).await.is_authenticated());
    }

    #[tokio::test]
    async fn invalid_token_is_anonymous() {
        let auth = RequestAuthenticator::new(codec(), IdentityLookup::new(Arc::new(member_store())));
        let ctx = auth.authenticate(&headers_with("Bearer invalidtoken")).await;
        assert!(!ctx.is_authenticated());
    }

    #[tokio::test]
    async fn unknown_subject_is_anonymous() {
        let c = codec();
        let auth = RequestAuthenticator::new(c.clone(), IdentityLookup::new(Arc::new(member_store())));
        let token = token_for(&c, "ghost@test.com");
        assert!(!auth.authenticate(&headers_with(&format!("Bearer {token}"))).await.is_authenticated());
    }

    #[tokio::test]
    async fn store_failure_is_anonymous() {
        let c = codec();
        let auth = RequestAuthenticator::new(c.clone(), IdentityLookup::new(Arc::new(FailingStore)));
        let token = token_for(&c, "user@test.com");
        assert!(!auth.authenticate(&headers_with(&format!("Bearer {token}"))).await.is_authenticated());
    }

    #[tokio::test]
    async fn panic_during_lookup_is_anonymous() {
        let c = codec();
        let auth = RequestAuthenticator::new(c.clone(), IdentityLookup::new(Arc::new(PanickingStore)));
        let token = token_for(&c, "user@test.com");
        assert!(!auth.authenticate(&headers_with(&format!("Bearer {token}"))).await.is_authenticated());
    }

    #[tokio::test]
    async fn request_id_is_carried() {
        let auth = RequestAuthenticator::new(codec(), IdentityLookup::new(Arc::new(member_store())));
        let mut h = HeaderMap::new();
        h.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-42"));
        assert_eq!(auth.authenticate(&h).await.request_id.as_deref(), Some("req-42"));
    }
}
