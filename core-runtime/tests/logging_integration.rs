//! Integration tests for the logging system.
//!
//! A global subscriber can be installed once per process, so everything that
//! depends on `init_logging` lives in a single test.

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }

    fn min_level(&self) -> LogLevel {
        LogLevel::Debug
    }
}

#[test]
fn test_init_logging_mirrors_into_sink_and_rejects_second_init() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_filter("logging_integration=debug")
        .with_logger_sink(sink.clone());

    init_logging(config).expect("first init succeeds");

    tracing::debug!(refresh_token = "r-1", email = "someone@example.com", "token rotated");
    tracing::trace!("filtered out");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "token rotated");
        assert_eq!(entries[0].level, LogLevel::Debug);
        assert_eq!(entries[0].fields.get("refresh_token"), Some(&"[REDACTED]".to_string()));
        assert_eq!(entries[0].fields.get("email"), Some(&"s***@[REDACTED]".to_string()));
    }

    let second = init_logging(LoggingConfig::default());
    assert!(second.is_err());
}

#[test]
fn test_invalid_filter_is_a_config_error() {
    let config = LoggingConfig::default().with_filter("core_auth=notalevel[");
    let err = init_logging(config).unwrap_err();
    assert!(err.to_string().contains("filter"));
}

#[test]
fn test_redaction_leaves_plain_values() {
    assert_eq!(redact_if_sensitive("action", "evaluate_tunnels"), "evaluate_tunnels");
    assert_eq!(redact_if_sensitive("code", "401"), "401");
}
