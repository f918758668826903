//! Test logging for the workspace's test binaries.
//!
//! Integration test binaries call [`init`] from a `#[ctor::ctor]` hook so
//! migration and lifecycle events show up next to the failing test.

use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Filter used when neither `TEST_LOG` nor `RUST_LOG` is set. The sqlx pool
/// is noisy at `warn` when connections are closed mid-test.
const DEFAULT_FILTER: &str = "warn,sqlx=error";

fn directives(test_log: Option<String>, rust_log: Option<String>) -> String {
    let non_blank = |d: &String| !d.trim().is_empty();
    test_log
        .filter(non_blank)
        .or_else(|| rust_log.filter(non_blank))
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Install the test subscriber once per process.
///
/// Filter precedence: `TEST_LOG`, then `RUST_LOG`, then `warn`. Safe to call
/// from several tests; a subscriber installed elsewhere is left in place.
pub fn init() {
    INSTALLED.get_or_init(|| {
        let directives = directives(
            std::env::var("TEST_LOG").ok(),
            std::env::var("RUST_LOG").ok(),
        );

        let _ = fmt()
            .with_env_filter(EnvFilter::new(directives))
            .with_test_writer()
            .with_target(true)
            .without_time()
            .try_init();
    });
}
