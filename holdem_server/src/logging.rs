//! Structured logging configuration.
//!
//! The engine logs through the `log` facade; the subscriber installed here
//! picks those records up alongside the server's own `tracing` events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` isn't set.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Initialize structured logging. Log levels come from `RUST_LOG`.
///
/// # Example
///
/// ```no_run
/// use holdem_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Example
///
/// ```
/// use holdem_server::logging::log_security_event;
///
/// log_security_event("rate_limited", Some(123), Some(7), "Action rate limit exceeded");
/// ```
pub fn log_security_event(event_type: &str, user_id: Option<i64>, table_id: Option<i64>, message: &str) {
    tracing::warn!(
        event_type = event_type,
        user_id = user_id,
        table_id = table_id,
        "SECURITY: {}",
        message
    );
}

/// Log a WebSocket session opening or closing.
pub fn log_connection(event: &str, table_id: i64, user_id: i64) {
    tracing::info!(
        event = event,
        table_id = table_id,
        user_id = user_id,
        "WebSocket {}",
        event
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_log_security_event() {
        // Just ensure it doesn't panic
        log_security_event("test_event", Some(1), None, "Test message");
    }

    #[test]
    fn test_log_connection() {
        log_connection("connected", 1, 42);
    }
}
