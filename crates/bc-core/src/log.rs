//! Reads the `BCLIBC_LOG_LEVEL` environment variable exactly once and wires
//! it onto the `log` facade's global max level. Actual log output is the
//! host's concern (a sink such as `env_logger` is wired up by the binary or
//! test harness, never by this library).

use std::sync::OnceLock;

static INIT: OnceLock<()> = OnceLock::new();

/// Integer log-level convention shared with the original implementation
/// (kept numerically identical so an existing `BCLIBC_LOG_LEVEL` value means
/// the same thing here as it did there).
fn level_filter_from_int(level: i64) -> log::LevelFilter {
    // `log` has no distinct "critical" level; both 50 and 40 map to Error.
    match level {
        i64::MIN..=0 => log::LevelFilter::Trace, // NOTSET: log everything
        1..=10 => log::LevelFilter::Debug,
        11..=20 => log::LevelFilter::Info,
        21..=30 => log::LevelFilter::Warn,
        _ => log::LevelFilter::Error,
    }
}

/// Ensures the process-wide log level has been read from the environment
/// and applied. Safe to call repeatedly; only the first call has effect.
pub fn ensure_log_level_initialized() {
    INIT.get_or_init(|| {
        let level = match std::env::var("BCLIBC_LOG_LEVEL") {
            Ok(raw) => match raw.trim().parse::<i64>() {
                Ok(v) => level_filter_from_int(v.max(0)),
                Err(_) => log::LevelFilter::Off,
            },
            // Unset: default to near-silent, matching the original's
            // default-to-CRITICAL (i.e. almost nothing logged) behaviour.
            Err(_) => log::LevelFilter::Off,
        };
        log::set_max_level(level);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_mapping_matches_source_convention() {
        assert_eq!(level_filter_from_int(50), log::LevelFilter::Error);
        assert_eq!(level_filter_from_int(40), log::LevelFilter::Error);
        assert_eq!(level_filter_from_int(30), log::LevelFilter::Warn);
        assert_eq!(level_filter_from_int(20), log::LevelFilter::Info);
        assert_eq!(level_filter_from_int(10), log::LevelFilter::Debug);
        assert_eq!(level_filter_from_int(0), log::LevelFilter::Trace);
    }

    #[test]
    fn init_is_idempotent() {
        ensure_log_level_initialized();
        ensure_log_level_initialized();
    }
}
