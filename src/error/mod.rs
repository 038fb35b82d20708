//! Error handling for stream resolution
//!
//! This module defines the error taxonomy and formatting helpers used throughout the crate.

pub mod formatting;
pub mod types;

pub use formatting::{
    format_error, format_error_for_logging, format_resolve_error,
    format_resolve_error_for_logging,
};
pub use types::{Error, ResolveError, ResolveStage, Result};
