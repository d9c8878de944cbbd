//! Logging setup.
//!
//! The crate only emits `tracing` events; installing a subscriber is up to
//! the host. These helpers install a `tracing-subscriber` fmt layer filtered
//! by an `EnvFilter`, read from `SPARK_DOM_LOG` unless directives are given.
//!
//! ```text
//! SPARK_DOM_LOG=spark_dom=debug            passes, suspensions, settlements
//! SPARK_DOM_LOG=spark_dom::engine=trace    every component render and commit
//! ```

use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "SPARK_DOM_LOG";

const DEFAULT_DIRECTIVES: &str = "spark_dom=info";

fn filter(directives: Option<&str>) -> EnvFilter {
    match directives {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_env(LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES)),
    }
}

/// Install a global fmt subscriber.
///
/// Returns false if a global subscriber was already installed.
pub fn init(directives: Option<&str>) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(directives))
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Install a subscriber that writes through the test harness's captured
/// output. Safe to call from every test.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(None))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_directives_win() {
        let filter = filter(Some("spark_dom=trace"));
        assert!(filter.to_string().contains("spark_dom=trace"));
    }

    #[test]
    fn test_init_for_tests_is_idempotent() {
        init_for_tests();
        init_for_tests();
        assert!(!init(None));
    }
}
