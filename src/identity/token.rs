//! Stateless bearer tokens.
//!
//! A token is a compact JWT (`header.payload.signature`, base64url without
//! padding) signed with HMAC-SHA512 over a single server-held secret. Claims
//! are the subject (the member's login key), `iat` and `exp` in epoch seconds.
//! Nothing is stored server-side: expiry is the only way a token stops working.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use thiserror::Error;

use super::principal::Principal;

pub type BearerToken = String;

pub const TOKEN_ALGORITHM: &str = "HS512";

/// Longest token lifetime a codec will issue; longer TTLs are clamped to it.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("unsupported token algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

pub struct TokenCodec {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenCodec(ttl_secs={}, secret=[REDACTED])", self.ttl_secs)
    }
}

impl TokenCodec {
    /// Claims carry whole seconds, so the TTL is rounded up to the next second
    /// (minimum 1s) and clamped to `MAX_TOKEN_TTL`.
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        let max_secs = MAX_TOKEN_TTL.as_secs() as i64;
        let secs = ttl.as_secs().saturating_add(u64::from(ttl.subsec_nanos() > 0));
        let ttl_secs = i64::try_from(secs).unwrap_or(max_secs).clamp(1, max_secs);
        Self { secret: secret.into(), ttl_secs }
    }

    pub fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_secs as u64) }

    pub fn issue(&self, principal: &Principal) -> Result<BearerToken, TokenError> {
        self.issue_at(principal, Utc::now())
    }

    pub fn issue_at(&self, principal: &Principal, now: DateTime<Utc>) -> Result<BearerToken, TokenError> {
        let iat = now.timestamp();
        let claims = Claims { sub: principal.login_key.clone(), iat, exp: iat + self.ttl_secs };
        let header = Header { alg: TOKEN_ALGORITHM.to_string(), typ: Some("JWT".to_string()) };
        let header_json = serde_json::to_vec(&header).map_err(|e| TokenError::Signing(e.to_string()))?;
        let claims_json = serde_json::to_vec(&claims).map_err(|e| TokenError::Signing(e.to_string()))?;
        let signing_input = format!("{}.{}", URL_SAFE_NO_PAD.encode(header_json), URL_SAFE_NO_PAD.encode(claims_json));
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", signing_input, signature))
    }

    /// True only for a well-formed HS512 token signed with our secret whose `exp` is still ahead.
    pub fn validate(&self, token: &str) -> bool {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.decode_at(token, now).is_ok()
    }

    /// Subject of a token that passes validation; an error for any other token.
    pub fn subject_of(&self, token: &str) -> Result<String, TokenError> {
        self.decode_at(token, Utc::now()).map(|c| c.sub)
    }

    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed("expected three dot-separated segments".into()));
        };

        let header: Header = decode_segment(header_b64)?;
        if header.alg != TOKEN_ALGORITHM {
            return Err(TokenError::UnsupportedAlgorithm(header.alg));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|e| TokenError::Malformed(e.to_string()))?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenError::InvalidSignature)?;

        let claims: Claims = decode_segment(claims_b64)?;
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha512, TokenError> {
        HmacSha512::new_from_slice(&self.secret).map_err(|e| TokenError::Signing(e.to_string()))
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| TokenError::Malformed(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn member() -> Principal {
        Principal {
            id: 1,
            login_key: "test@example.com".into(),
            first_name: "John".into(),
            last_name: "Doe".into(),
            admin: false,
            credential_hash: "password123".into(),
        }
    }

    fn codec() -> TokenCodec { TokenCodec::new("testSecret", Duration::from_millis(60_000)) }

    fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

    #[test]
    fn issued_token_validates_and_carries_subject() {
        let c = codec();
        let token = c.issue(&member()).unwrap();
        assert!(c.validate(&token));
        assert_eq!(c.subject_of(&token).unwrap(), "test@example.com");
    }

    #[test]
    fn expiry_is_strict() {
        let c = codec();
        let token = c.issue_at(&member(), at(1_700_000_000)).unwrap();
        let claims = c.decode_at(&token, at(1_700_000_000)).unwrap();
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp, 1_700_000_060);
        assert!(c.validate_at(&token, at(1_700_000_059)));
        assert!(!c.validate_at(&token, at(1_700_000_060)));
        assert_eq!(c.decode_at(&token, at(1_700_000_061)), Err(TokenError::Expired));
    }

    #[test]
    fn expired_token_fails_validate() {
        let c = codec();
        let token = c.issue_at(&member(), Utc::now() - chrono::Duration::seconds(120)).unwrap();
        assert!(!c.validate(&token));
        assert!(c.subject_of(&token).is_err());
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let ours = codec();
        let theirs = TokenCodec::new("wrongSecret", Duration::from_millis(60_000));
        let token = theirs.issue(&member()).unwrap();
        assert!(!ours.validate(&token));
        assert_eq!(ours.subject_of(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn tampered_claims_are_rejected() {
        let c = codec();
        let token = c.issue(&member()).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(br#"{"sub":"yoga@studio.com","iat":0,"exp":99999999999}"#);
        parts[1] = &forged;
        assert!(!c.validate(&parts.join(".")));
    }

    #[test]
    fn other_algorithms_are_rejected() {
        let c = codec();
        let token = c.issue(&member()).unwrap();
        let rest = token.split_once('.').unwrap().1;
        let none_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let forged = format!("{}.{}", none_header, rest);
        assert_eq!(c.subject_of(&forged), Err(TokenError::UnsupportedAlgorithm("none".into())));
    }

    #[test]
    fn malformed_strings_never_validate() {
        let c = codec();
        for s in ["", ".", "..", "this.is.not.a.jwt", "abc", "a.b.c", "%%%.%%%.%%%", "Bearer x.y.z", "ünïcödé.x.y"] {
            assert!(!c.validate(s), "{s:?} should not validate");
        }
    }

    #[test]
    fn sub_second_ttl_rounds_up() {
        let c = TokenCodec::new("k", Duration::from_millis(1));
        assert_eq!(c.ttl(), Duration::from_secs(1));
        let c = TokenCodec::new("k", Duration::from_millis(1_500));
        assert_eq!(c.ttl(), Duration::from_secs(2));
        let token = c.issue(&member()).unwrap();
        assert!(c.validate(&token));
    }

    #[test]
    fn huge_ttl_is_clamped() {
        for ttl in [Duration::from_millis(u64::MAX), Duration::from_millis(i64::MAX as u64), Duration::MAX] {
            let c = TokenCodec::new("k", ttl);
            assert_eq!(c.ttl(), MAX_TOKEN_TTL);
            let token = c.issue_at(&member(), at(1_700_000_000)).unwrap();
            assert!(c.validate_at(&token, at(1_700_000_000 + MAX_TOKEN_TTL.as_secs() as i64 - 1)));
        }
    }

    #[test]
    fn header_without_typ_is_accepted() {
        let c = codec();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS512"}"#);
        let claims = URL_SAFE_NO_PAD.encode(br#"{"sub":"test@example.com","iat":1700000000,"exp":1700000060}"#);
        let signing_input = format!("{header}.{claims}");
        let mut mac = c.mac().unwrap();
        mac.update(signing_input.as_bytes());
        let token = format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()));
        assert_eq!(c.decode_at(&token, at(1_700_000_030)).unwrap().sub, "test@example.com");
    }
}
