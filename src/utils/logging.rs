//! Tracing subscriber setup

use crate::config::LoggingSettings;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber writing to stderr
///
/// `RUST_LOG` overrides the configured level. Returns `false` when a global
/// subscriber was already installed.
pub fn init_logging(settings: &LoggingSettings) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| settings.level.to_lowercase().into());
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if settings.format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        let settings = LoggingSettings::default();
        init_logging(&settings);
        assert!(!init_logging(&settings));
    }
}
