//! Logging and observability
//!
//! Structured logging via tracing-subscriber, with text or JSON formatting
//! selected at runtime through environment variables and CLI flags.
//!
//! All logging output is directed to stderr so captured container output on
//! stdout stays clean.

use anyhow::Result;
use std::{io, sync::Once};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding the log filter directive
pub const LOG_ENV: &str = "DOCKCALL_LOG";

/// Environment variable selecting the log format ("json" or "text")
pub const LOG_FORMAT_ENV: &str = "DOCKCALL_LOG_FORMAT";

/// Environment variable selecting span lifecycle events
pub const LOG_SPAN_EVENTS_ENV: &str = "DOCKCALL_LOG_SPAN_EVENTS";

static INIT: Once = Once::new();

/// Initialize the logging system with an optional format
///
/// Safe to call more than once; only the first call installs a subscriber.
///
/// ## Arguments
///
/// * `format` - `None` or `"text"` for human-readable output, `"json"` for
///   structured output. When `None`, `DOCKCALL_LOG_FORMAT` is consulted.
///
/// ## Environment Variables
///
/// * `DOCKCALL_LOG_FORMAT` - log output format
/// * `DOCKCALL_LOG` - filter directive, e.g. `dockcall_core=debug`
/// * `RUST_LOG` - fallback filter directive
/// * `DOCKCALL_LOG_SPAN_EVENTS` - comma separated span events (`new`, `close`, `full`, ...)
///
/// ## Example
///
/// ```rust
/// use dockcall_core::logging;
///
/// logging::init(None).expect("Failed to initialize logging");
/// ```
pub fn init(format: Option<&str>) -> Result<()> {
    INIT.call_once(|| {
        let filter = create_env_filter();

        let env_format = std::env::var(LOG_FORMAT_ENV).ok();
        let effective_format = format.or(env_format.as_deref()).unwrap_or("text");
        let span_events = span_events_for_format(effective_format);

        match effective_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_span_events(span_events)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .with_target(true)
                            .with_span_events(span_events)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
        }

        tracing::debug!("Logging initialized with format: {}", effective_format);
    });

    Ok(())
}

fn create_env_filter() -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(spec) => parse_filter(&spec),
        Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

fn parse_filter(spec: &str) -> EnvFilter {
    EnvFilter::try_new(spec).unwrap_or_else(|_| {
        tracing::warn!(
            "Invalid {} specification '{}', using default 'info'",
            LOG_ENV,
            spec
        );
        EnvFilter::new("info")
    })
}

/// Span lifecycle events: the env var wins, otherwise JSON gets NEW|CLOSE and text gets none
fn span_events_for_format(format: &str) -> fmt::format::FmtSpan {
    match std::env::var(LOG_SPAN_EVENTS_ENV) {
        Ok(raw) => parse_span_events(&raw),
        Err(_) => match format {
            "json" => fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE,
            _ => fmt::format::FmtSpan::NONE,
        },
    }
}

fn parse_span_events(raw: &str) -> fmt::format::FmtSpan {
    use fmt::format::FmtSpan;

    let mut acc = FmtSpan::NONE;
    for token in raw.split(&[',', '|'][..]).map(|t| t.trim().to_lowercase()) {
        acc |= match token.as_str() {
            "new" => FmtSpan::NEW,
            "close" => FmtSpan::CLOSE,
            "enter" => FmtSpan::ENTER,
            "exit" => FmtSpan::EXIT,
            "active" => FmtSpan::ACTIVE,
            "full" => FmtSpan::FULL,
            _ => FmtSpan::NONE,
        };
    }
    acc
}

/// Whether [`init`] has already installed a subscriber
pub fn is_initialized() -> bool {
    INIT.is_completed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmt::format::FmtSpan;

    #[test]
    fn test_init_multiple_calls_safe() {
        assert!(init(None).is_ok());
        assert!(init(Some("json")).is_ok());
        assert!(init(Some("bogus")).is_ok());
        assert!(is_initialized());
    }

    #[test]
    fn test_parse_span_events() {
        assert_eq!(parse_span_events("new,close"), FmtSpan::NEW | FmtSpan::CLOSE);
        assert_eq!(parse_span_events(" FULL "), FmtSpan::FULL);
        assert_eq!(parse_span_events("enter|exit"), FmtSpan::ENTER | FmtSpan::EXIT);
        assert_eq!(parse_span_events("nonsense"), FmtSpan::NONE);
    }

    #[test]
    fn test_invalid_filter_falls_back() {
        // Must not panic
        let _filter = parse_filter("invalid_spec_@@[");
        let _filter = parse_filter("dockcall_core=debug");
    }
}
