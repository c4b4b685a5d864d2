//! Infrastructure adapters and runtime bootstrap.

pub mod cache;
pub mod db;
pub mod error;
pub mod http;
pub mod memory;
pub mod nonce;
pub mod telemetry;
pub mod webhook;
