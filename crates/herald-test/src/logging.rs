//! Logging for tests.

use herald_telemetry::{LogConfig, LogFormat, LogTarget, setup_logging};

/// Route `tracing` output through the libtest capture writer.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_test_logging() {
    let config = LogConfig::new("debug")
        .with_format(LogFormat::Compact)
        .with_target(LogTarget::Test)
        .without_ansi();
    // A subscriber from an earlier test is fine.
    let _ = setup_logging(&config);
}
