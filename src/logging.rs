//! # Structured Logging Module
//!
//! Environment-aware structured logging for the workflow engine. Console output
//! is human readable by default and switches to JSON lines when
//! `RELEASE_WORKFLOW_LOG_FORMAT=json`.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call repeatedly; an already installed global subscriber is kept.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = build_filter(&environment);
        let json = wants_json(std::env::var("RELEASE_WORKFLOW_LOG_FORMAT").ok().as_deref());

        let console = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(filter)
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(filter)
                .boxed()
        };

        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Current environment from `RELEASE_WORKFLOW_ENV`, then `APP_ENV`
fn get_environment() -> String {
    std::env::var("RELEASE_WORKFLOW_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// `RUST_LOG` wins over the environment-derived level
fn build_filter(environment: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(get_log_level(environment)))
}

fn wants_json(format: Option<&str>) -> bool {
    format.is_some_and(|value| value.eq_ignore_ascii_case("json"))
}

/// Log structured data for a completed status transition
pub fn log_transition(
    release_id: &str,
    operation: &str,
    from_status: &str,
    to_status: &str,
    actor_id: &str,
) {
    tracing::info!(
        release_id = %release_id,
        operation = %operation,
        from_status = %from_status,
        to_status = %to_status,
        actor_id = %actor_id,
        "📋 RELEASE_TRANSITION"
    );
}

/// Log structured data for lock operations
pub fn log_lock_operation(release_id: &str, operation: &str, actor_id: Option<&str>, outcome: &str) {
    tracing::info!(
        release_id = %release_id,
        operation = %operation,
        actor_id = actor_id,
        outcome = %outcome,
        "🔒 LOCK_OPERATION"
    );
}

/// Log a swallowed side-effect failure with full context
pub fn log_side_effect_failure(component: &str, release_id: &str, error: &str) {
    tracing::error!(
        component = %component,
        release_id = %release_id,
        error = %error,
        "❌ SIDE_EFFECT_FAILED"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_json_format_detection() {
        assert!(wants_json(Some("json")));
        assert!(wants_json(Some("JSON")));
        assert!(!wants_json(Some("pretty")));
        assert!(!wants_json(None));
    }

    #[test]
    fn test_init_is_idempotent() {
        init_structured_logging();
        init_structured_logging();
        assert!(LOGGER_INITIALIZED.get().is_some());
    }
}
