//! Application services: key lifecycle, purge verification, regeneration.

pub mod error;
pub mod key_store;
pub mod nonce;
pub mod panel;
pub mod purge;
pub mod regeneration;
pub mod repos;
