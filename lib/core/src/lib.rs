//! Core identifiers and utilities shared across the labsite crates.
//!
//! This crate provides the typed ids for directory records and the
//! rootcause-based `Result` alias used by every layer.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{AdminId, MemberId, ParseIdError};
