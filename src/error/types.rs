//! Error classification for protected stream resolution
//!
//! Every component surfaces the most specific kind it can determine. The
//! orchestrator only annotates errors with the stage that produced them.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML configuration parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Asset carries no license or manifest information
    #[error("Invalid asset {content}: {reason}")]
    InvalidAsset {
        /// Content the asset metadata belongs to
        content: String,
        /// What is missing
        reason: String,
    },

    /// Cryptographic module could not produce a challenge
    #[error("Cryptographic module error: {message}")]
    Module {
        /// Message reported by the module
        message: String,
    },

    /// Network-level failure
    #[error("Transport error: {message}")]
    Transport {
        /// Error message describing the failure
        message: String,
        /// HTTP status when the server answered
        status: Option<u16>,
    },

    /// Bad or expired credentials
    #[error("Unauthorized: {reason}")]
    Unauthorized {
        /// The reason why the request was rejected
        reason: String,
        /// The endpoint that rejected the credentials
        endpoint: Option<String>,
    },

    /// Explicit backoff signal from a provider
    #[error("Rate limited: {message}")]
    RateLimited {
        /// Message describing the rate limit
        message: String,
        /// Seconds to wait before retrying
        retry_after: Option<u64>,
    },

    /// License response rejected by the cryptographic module
    #[error("License decode error: {message}")]
    LicenseDecode {
        /// Message describing why the license was rejected
        message: String,
    },

    /// Decoded license does not cover every key the variant needs
    #[error("License is missing content keys: {}", missing.join(", "))]
    MissingContentKeys {
        /// Key-IDs (lowercase hex) absent from the license
        missing: Vec<String>,
    },

    /// Player logic uses a transform the resolver does not recognise
    #[error("Unsupported cipher operation '{operation}' in player {version}")]
    UnsupportedOperation {
        /// Content version the player logic belongs to
        version: String,
        /// The offending helper or statement
        operation: String,
    },

    /// Player logic does not contain a recognisable transform function
    #[error("Cipher extraction failed for player {version}: {message}")]
    CipherExtraction {
        /// Content version the player logic belongs to
        version: String,
        /// Error message describing what could not be found
        message: String,
    },

    /// Selection policy filtered out every variant
    #[error("No variant matches policy: {reason}")]
    NoVariantMatchesPolicy {
        /// Which constraint emptied the candidate set
        reason: String,
    },

    /// Manifest could not be parsed
    #[error("Manifest error: {message}")]
    Manifest {
        /// Error message describing the parse failure
        message: String,
    },

    /// Timeout errors
    #[error("Operation timed out after {duration_secs} seconds: {operation}")]
    Timeout {
        /// The operation that timed out
        operation: String,
        /// Duration in seconds before timing out
        duration_secs: u64,
    },

    /// Configuration errors
    #[error("Configuration error in {field}: {message}")]
    Config {
        /// The configuration field that has an error
        field: String,
        /// Error message describing the issue
        message: String,
    },

    /// Cache persistence errors
    #[error("Cache error during {operation}: {details}")]
    Cache {
        /// The cache operation that failed
        operation: String,
        /// Detailed error description
        details: String,
    },

    /// No adapter registered under this provider name
    #[error("Unknown provider: {name}")]
    UnknownProvider {
        /// Requested provider name
        name: String,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal issue
        message: String,
        /// Additional context about where the error occurred
        context: Option<String>,
    },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            format!("request timed out: {}", e)
        } else if e.is_connect() {
            format!("connection failed: {}", e)
        } else {
            e.to_string()
        };
        Self::Transport {
            message,
            status: e.status().map(|s| s.as_u16()),
        }
    }
}

impl Error {
    /// Create an invalid asset error
    pub fn invalid_asset<S: Into<String>>(content: S, reason: S) -> Self {
        Self::InvalidAsset {
            content: content.into(),
            reason: reason.into(),
        }
    }

    /// Create a cryptographic module error
    pub fn module(message: impl Into<String>) -> Self {
        Self::Module {
            message: message.into(),
        }
    }

    /// Create a transport error without a status code
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
            endpoint: None,
        }
    }

    /// Create a license decode error
    pub fn license_decode(message: impl Into<String>) -> Self {
        Self::LicenseDecode {
            message: message.into(),
        }
    }

    /// Create an unsupported cipher operation error
    pub fn unsupported_operation<S: Into<String>>(version: S, operation: S) -> Self {
        Self::UnsupportedOperation {
            version: version.into(),
            operation: operation.into(),
        }
    }

    /// Create a cipher extraction error
    pub fn cipher_extraction<S: Into<String>>(version: S, message: S) -> Self {
        Self::CipherExtraction {
            version: version.into(),
            message: message.into(),
        }
    }

    /// Create a selection error
    pub fn no_variant(reason: impl Into<String>) -> Self {
        Self::NoVariantMatchesPolicy {
            reason: reason.into(),
        }
    }

    /// Create a manifest error
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_secs,
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(field: S, message: S) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a cache error
    pub fn cache<S: Into<String>>(operation: S, details: S) -> Self {
        Self::Cache {
            operation: operation.into(),
            details: details.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Classify a non-success HTTP status returned by `endpoint`
    pub fn from_status(status: StatusCode, retry_after: Option<u64>, endpoint: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized {
                reason: format!("{} returned {}", endpoint, status),
                endpoint: Some(endpoint.to_string()),
            },
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited {
                message: format!("{} returned {}", endpoint, status),
                retry_after,
            },
            _ => Self::Transport {
                message: format!("{} returned {}", endpoint, status),
                status: Some(status.as_u16()),
            },
        }
    }

    /// Check if the caller may retry the same request later
    ///
    /// `Unauthorized` is only retryable after the credentials were refreshed,
    /// so it is reported as not retryable here.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::RateLimited { .. } | Error::Timeout { .. }
        )
    }

    /// Check if refreshing credentials and retrying once may succeed
    pub fn needs_refresh(&self) -> bool {
        matches!(self, Error::Unauthorized { .. })
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Json(..) => "json",
            Error::Toml(..) => "toml",
            Error::Url(..) => "url",
            Error::Io(..) => "io",
            Error::InvalidAsset { .. } => "invalid_asset",
            Error::Module { .. } => "module",
            Error::Transport { .. } => "transport",
            Error::Unauthorized { .. } => "unauthorized",
            Error::RateLimited { .. } => "rate_limited",
            Error::LicenseDecode { .. } => "license_decode",
            Error::MissingContentKeys { .. } => "missing_content_keys",
            Error::UnsupportedOperation { .. } => "unsupported_operation",
            Error::CipherExtraction { .. } => "cipher_extraction",
            Error::NoVariantMatchesPolicy { .. } => "no_variant_matches_policy",
            Error::Manifest { .. } => "manifest",
            Error::Timeout { .. } => "timeout",
            Error::Config { .. } => "config",
            Error::Cache { .. } => "cache",
            Error::UnknownProvider { .. } => "unknown_provider",
            Error::Internal { .. } => "internal",
        }
    }
}

/// Stage of a resolution that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolveStage {
    /// Fetching asset metadata from the provider
    Metadata,
    /// Fetching the manifest from the provider
    Manifest,
    /// Applying the selection policy
    Selection,
    /// Deciphering the signature parameter
    Cipher,
    /// Negotiating the DRM license
    License,
}

impl ResolveStage {
    /// Stage name as used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveStage::Metadata => "metadata",
            ResolveStage::Manifest => "manifest",
            ResolveStage::Selection => "selection",
            ResolveStage::Cipher => "cipher",
            ResolveStage::License => "license",
        }
    }
}

impl fmt::Display for ResolveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by the resolution orchestrator
#[derive(Debug, Error)]
#[error("{stage} stage failed: {source}")]
pub struct ResolveError {
    /// Stage that failed
    pub stage: ResolveStage,
    /// Error reported by that stage, unchanged
    #[source]
    pub source: Error,
}

impl ResolveError {
    /// Attach a stage to an error
    pub fn new(stage: ResolveStage, source: Error) -> Self {
        Self { stage, source }
    }

    /// The unchanged error reported by the failing stage
    pub fn error(&self) -> &Error {
        &self.source
    }

    /// Consume and return the inner error
    pub fn into_error(self) -> Error {
        self.source
    }

    /// Category of the inner error
    pub fn category(&self) -> &'static str {
        self.source.category()
    }

    /// Whether the inner error is retryable
    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}
