//! Tracing for tests.
//!
//! Events go through the test harness writer, so they only show up for
//! failing tests (or with `--nocapture`). Without `RUST_LOG`, the hydrator
//! crates log at debug level (cache hits, fetches, fallbacks) and everything
//! else at warn.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_TEST_FILTER: &str = "warn,hydrator_core=debug,hydrator_config=debug";

/// Install the test subscriber. Later calls in the same process are no-ops.
///
/// ```ignore
/// #[tokio::test]
/// async fn resolves_links() {
///     hydrator_test_utils::tracing_setup::init_test_tracing();
///     // ...
/// }
/// ```
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_TEST_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .without_time()
        .try_init();
}
