//! # KAS Core
//!
//! This crate provides the fundamental building blocks for the KAS
//! key-array store:
//! - Element type registry and typed array views
//! - Error types
//!
//! The file format itself and the read/write engine live in `kas-store`;
//! this crate only defines the vocabulary they share.

pub mod error;
pub mod types;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::{ArrayRef, ElementType, NUM_ELEMENT_TYPES};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
