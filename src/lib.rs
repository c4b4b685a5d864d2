//! Remote cache purge endpoint guarded by a rotating secret key.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
