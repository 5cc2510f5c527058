//! # Postrate Shared
//!
//! Wire types shared between the API server and its clients. Kept free of
//! server-side crates so a client can depend on it alone.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse, Paginated};
