//! Error formatting utilities
//!
//! Human-readable and structured renderings of [`Error`] and
//! [`ResolveError`], used by callers that log or report failures.

use crate::{Error, error::ResolveError};
use std::error::Error as StdError;

/// Format error for display
///
/// Appends nested causes that are not already part of the message.
pub fn format_error(error: &Error) -> String {
    let formatted = match error {
        Error::Transport {
            message,
            status: Some(status),
        } => format!("Transport error (HTTP {}): {}", status, message),

        Error::RateLimited {
            message,
            retry_after: Some(after),
        } => format!("Rate limited, retry after {}s: {}", after, message),

        Error::Unauthorized {
            reason,
            endpoint: Some(endpoint),
        } => format!("Unauthorized at {}: {}", endpoint, reason),

        Error::Internal {
            message,
            context: Some(context),
        } => format!("Internal error in {}: {}", context, message),

        // For everything else the Display implementation is specific enough
        _ => error.to_string(),
    };

    append_causes(formatted, error.source())
}

/// Format a resolution failure, naming the stage
pub fn format_resolve_error(error: &ResolveError) -> String {
    format!("{} stage failed: {}", error.stage, format_error(&error.source))
}

fn append_causes(mut result: String, mut source: Option<&(dyn StdError + 'static)>) -> String {
    while let Some(cause) = source {
        if !result.contains(&cause.to_string()) {
            result = format!("{} (caused by {})", result, cause);
        }
        source = cause.source();
    }
    result
}

/// Format error for logging with structured data
pub fn format_error_for_logging(error: &Error) -> serde_json::Value {
    let mut log_data = serde_json::json!({
        "message": format_error(error),
        "category": error.category(),
        "retryable": error.is_retryable(),
    });

    match error {
        Error::Transport {
            status: Some(status),
            ..
        } => {
            log_data["status"] = serde_json::Value::Number((*status).into());
        }
        Error::RateLimited {
            retry_after: Some(after),
            ..
        } => {
            log_data["retry_after"] = serde_json::Value::Number((*after).into());
        }
        Error::Timeout { duration_secs, .. } => {
            log_data["timeout_duration"] = serde_json::Value::Number((*duration_secs).into());
        }
        Error::UnsupportedOperation { version, operation } => {
            log_data["player_version"] = serde_json::Value::String(version.clone());
            log_data["operation"] = serde_json::Value::String(operation.clone());
        }
        Error::MissingContentKeys { missing } => {
            log_data["missing_keys"] = serde_json::json!(missing);
        }
        _ => {}
    }

    log_data
}

/// Structured log data for a resolution failure
pub fn format_resolve_error_for_logging(error: &ResolveError) -> serde_json::Value {
    let mut log_data = format_error_for_logging(&error.source);
    log_data["stage"] = serde_json::Value::String(error.stage.as_str().to_string());
    log_data
}
