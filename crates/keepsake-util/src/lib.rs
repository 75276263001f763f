//! Shared utilities for keepsake.
//!
//! This crate provides common utilities used across the keepsake workspace:
//! - ULID-based identifier generation
//! - Logging setup with tracing
//! - Path utilities

pub mod id;
pub mod log;
pub mod path;

pub use id::{IdPrefix, Identifier};
