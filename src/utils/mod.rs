//! Utility functions and helpers
//!
//! Logging setup, cipher program persistence and version information.

pub mod cache;
pub mod logging;
pub mod version;

pub use logging::init_logging;
pub use version::VERSION;
