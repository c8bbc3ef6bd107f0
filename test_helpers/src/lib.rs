//! Test-only helpers shared across the workspace: logging init for tests
//! run with `RUST_LOG` set, an `assert_error!` macro for matching error
//! variants without a full `PartialEq` derive, and (behind
//! `future_timeout`) a future-timeout assertion.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]

use std::sync::Once;

#[cfg(feature = "future_timeout")]
mod timeout;
#[cfg(feature = "future_timeout")]
pub use timeout::*;

static LOG_SETUP: Once = Once::new();

/// Installs a `tracing-subscriber` once per process, honoring `RUST_LOG`
/// (and a `.env` file, via `dotenvy`) the way an interactive run would.
/// Safe to call from every test — only the first call takes effect.
pub fn maybe_start_logging() {
    LOG_SETUP.call_once(|| {
        let _ = dotenvy::dotenv();
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}

/// Asserts that `$e` matches the pattern `$pattern`, printing the actual
/// value on failure (variants of hand-rolled error enums rarely implement
/// `PartialEq` across their whole tree, so a plain `assert_eq!` won't do).
#[macro_export]
macro_rules! assert_error {
    ($e:expr, $pattern:pat) => {
        assert!(matches!(&$e, $pattern), "expected {}, got {:?}", stringify!($pattern), $e);
    };
}
