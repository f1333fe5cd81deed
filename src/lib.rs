pub mod server;
pub mod storage;
pub mod security;
pub mod identity;
pub mod participation;
pub mod config;
pub mod error;
