//! Server configuration read from `YOGA_*` environment variables.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::identity::MAX_TOKEN_TTL;

pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_JWT_SECRET: &str = "openclassrooms";
pub const DEFAULT_JWT_EXPIRATION_MS: u64 = 86_400_000;
pub const DEFAULT_ADMIN_EMAIL: &str = "yoga@studio.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "test!1234";

#[derive(Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    pub jwt_secret: String,
    pub jwt_expiration_ms: u64,
    pub admin_email: String,
    pub admin_password: String,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_port", &self.http_port)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expiration_ms", &self.jwt_expiration_ms)
            .field("admin_email", &self.admin_email)
            .field("admin_password", &"[REDACTED]")
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_expiration_ms: DEFAULT_JWT_EXPIRATION_MS,
            admin_email: DEFAULT_ADMIN_EMAIL.to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(v) = get("YOGA_HTTP_PORT") {
            cfg.http_port = v.trim().parse().with_context(|| format!("YOGA_HTTP_PORT is not a port: '{}'", v))?;
        }
        if let Some(v) = get("YOGA_JWT_SECRET") {
            anyhow::ensure!(!v.is_empty(), "YOGA_JWT_SECRET must not be empty");
            cfg.jwt_secret = v;
        }
        if let Some(v) = get("YOGA_JWT_EXPIRATION_MS") {
            let ms: u64 = v.trim().parse().with_context(|| format!("YOGA_JWT_EXPIRATION_MS is not a number: '{}'", v))?;
            anyhow::ensure!(
                u128::from(ms) <= MAX_TOKEN_TTL.as_millis(),
                "YOGA_JWT_EXPIRATION_MS {} exceeds the maximum of {} ms",
                ms,
                MAX_TOKEN_TTL.as_millis()
            );
            cfg.jwt_expiration_ms = ms;
        }
        if let Some(v) = get("YOGA_ADMIN_EMAIL") { cfg.admin_email = v; }
        if let Some(v) = get("YOGA_ADMIN_PASSWORD") { cfg.admin_password = v; }
        Ok(cfg)
    }

    pub fn jwt_ttl(&self) -> Duration { Duration::from_millis(self.jwt_expiration_ms) }
}
