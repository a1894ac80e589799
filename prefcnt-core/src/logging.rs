//! Structured logging using **tracing**.
//!
//! Events go to stderr as JSON so stdout carries only the report. Work on a
//! translation unit runs inside a `refcnt_unit` span, so every event from the
//! marker carries the unit name.

use tracing::{error, info, info_span, warn, Span};
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_LOG_FILTER: &str = "prefcnt_core=warn,prefcnt=warn";

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Initializes the global tracing subscriber. Call once, from the binary.
///
/// `RUST_LOG` overrides [`DEFAULT_LOG_FILTER`], e.g.
/// `RUST_LOG=prefcnt_core=debug` for one event per reference-counted unit.
pub fn init_structured_logging() {
    tracing_subscriber::fmt()
        .json()
        .with_ansi(false)
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Span covering the first pass over one translation unit.
pub fn unit_span(unit: &str) -> Span {
    info_span!("refcnt_unit", unit = %unit)
}

pub fn log_warn(message: &str) {
    warn!(detail = %message);
}

pub fn log_info(message: &str) {
    info!(detail = %message);
}

pub fn log_error(message: &str) {
    error!(detail = %message);
}
