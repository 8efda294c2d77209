//! Tracing initialisation for tests.
//!
//! The subscriber is installed at most once per process, so every test may
//! call [`init_test_tracing`].

use tracing_subscriber::EnvFilter;

/// Install a subscriber that writes through the test harness.
///
/// Honors `RUST_LOG`; defaults to `debug` for the tabshim crates so bridge
/// traffic shows up in failing-test output.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,tabshim_core=debug")),
        )
        .with_test_writer()
        .try_init();
}
