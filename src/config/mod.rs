//! Configuration management for the resolver
//!
//! Handles loading configuration from files, environment variables, and defaults.

pub mod loader;
pub mod settings;

pub use loader::ConfigLoader;
pub use settings::{
    CipherSettings, LicenseResponseFormat, LicenseSettings, LoggingSettings, NetworkSettings,
    ResolveSettings, SelectionSettings, Settings,
};

/// Serializes unit tests that touch process-wide environment variables
#[cfg(test)]
pub(crate) static ENV_TEST_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
