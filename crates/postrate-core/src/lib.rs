//! # Postrate Core
//!
//! The domain layer of the Postrate backend.
//! Entities, error types, ports (traits implemented by `postrate-infra`) and the
//! services that keep the fast store consistent with the durable store:
//! read-through caching with prefix invalidation, like/view counters, and the
//! exchange-rate refresh pipeline.

pub mod cache;
pub mod domain;
pub mod error;
pub mod ports;
pub mod services;

pub use error::DomainError;
