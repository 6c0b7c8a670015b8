//! Verbosity-gated diagnostics written to stderr.
//!
//! `SchedulingConfig.verbosity` selects how much the scheduler reports:
//! - 0: silent; failures surface only as returned errors
//! - 1: changes, one line per placed or skipped instance and a request total
//! - 2: checks, resolved candidate windows and expanded instances
//! - 3: debug, grid binning and cost series construction
//!
//! Every line is tagged with its level so interleaved host output stays
//! attributable.

pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_CHANGES: u8 = 1;
pub const VERBOSITY_CHECKS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Whether a message at `level` is printed under `verbosity`.
#[inline]
pub fn enabled(verbosity: u8, level: u8) -> bool {
    level > VERBOSITY_SILENT && verbosity >= level
}

/// Short tag printed in front of messages at `level`.
pub fn level_tag(level: u8) -> &'static str {
    match level {
        VERBOSITY_CHANGES => "greengrid",
        VERBOSITY_CHECKS => "greengrid:check",
        _ => "greengrid:debug",
    }
}

/// Print at an explicit level. Prefer the level-named macros below.
#[macro_export]
macro_rules! log_at {
    ($level:expr, $verbosity:expr, $($arg:tt)*) => {
        if $crate::logging::enabled($verbosity, $level) {
            eprintln!("[{}] {}", $crate::logging::level_tag($level), format_args!($($arg)*));
        }
    };
}

/// Placements, skipped instances and request totals.
#[macro_export]
macro_rules! log_changes {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::log_at!($crate::logging::VERBOSITY_CHANGES, $verbosity, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_checks {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::log_at!($crate::logging::VERBOSITY_CHECKS, $verbosity, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::log_at!($crate::logging::VERBOSITY_DEBUG, $verbosity, $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_by_level() {
        assert!(!enabled(VERBOSITY_SILENT, VERBOSITY_CHANGES));
        assert!(enabled(VERBOSITY_CHANGES, VERBOSITY_CHANGES));
        assert!(!enabled(VERBOSITY_CHANGES, VERBOSITY_CHECKS));
        assert!(enabled(VERBOSITY_DEBUG, VERBOSITY_CHECKS));
        // Nothing is printed at the silent level itself
        assert!(!enabled(VERBOSITY_DEBUG, VERBOSITY_SILENT));
    }

    #[test]
    fn test_level_tags() {
        assert_eq!(level_tag(VERBOSITY_CHANGES), "greengrid");
        assert_eq!(level_tag(VERBOSITY_CHECKS), "greengrid:check");
        assert_eq!(level_tag(VERBOSITY_DEBUG), "greengrid:debug");
    }

    #[test]
    fn test_macros_expand_at_every_level() {
        for verbosity in VERBOSITY_SILENT..=VERBOSITY_DEBUG {
            log_changes!(verbosity, "assigned {} to slot {}", "ev", 3);
            log_checks!(verbosity, "window [{}, {}]", 0, 4);
            log_debug!(verbosity, "filled {} slots", 2);
        }
    }
}
