//! # Contracts
//!
//! Shared configuration model and error types for the relay.
//! Business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Delivery Model
//! - One `RelayBlueprint` describes one set of destination hosts
//! - Every host shares the same context path, method and headers
//! - Payloads arrive gzip-compressed and leave decompressed

mod blueprint;
mod error;

pub use blueprint::*;
pub use error::*;
