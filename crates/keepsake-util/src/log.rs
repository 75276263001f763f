//! Tracing setup for the keepsake binary.
//!
//! Output goes to stderr so command output on stdout stays machine-readable.
//! Only keepsake's own crates are filtered in; `RUST_LOG` overrides that.

use std::fmt;
use tracing_subscriber::{fmt as fmt_layer, prelude::*, EnvFilter};

/// Crates whose events pass the default filter.
const KEEPSAKE_TARGETS: [&str; 5] = [
    "keepsake",
    "keepsake_history",
    "keepsake_storage",
    "keepsake_watch",
    "keepsake_util",
];

/// Verbosity accepted by `log_level` in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    /// Every level, most verbose first.
    pub const ALL: [LogLevel; 5] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Case-insensitive lookup by name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Add source file and line to each event.
    pub include_location: bool,
}

/// `EnvFilter` directive enabling `level` for keepsake crates only.
pub fn filter_directive(level: LogLevel) -> String {
    KEEPSAKE_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber.
///
/// Returns `false` if one was already installed, in which case nothing
/// changes.
pub fn init(config: LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config.level)));

    let events = fmt_layer::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    tracing_subscriber::registry()
        .with(filter)
        .with(events)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ignores_case_and_padding() {
        assert_eq!(LogLevel::parse("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse(" WARN "), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("verbose"), None);
    }

    #[test]
    fn test_every_level_parses_back_from_its_name() {
        for level in LogLevel::ALL {
            assert_eq!(LogLevel::parse(&level.to_string()), Some(level));
        }
    }

    #[test]
    fn test_filter_directive_lists_each_crate() {
        assert_eq!(
            filter_directive(LogLevel::Debug),
            "keepsake=debug,keepsake_history=debug,keepsake_storage=debug,\
             keepsake_watch=debug,keepsake_util=debug"
        );
    }

    #[test]
    fn test_defaults_to_warn_without_location() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Warn);
        assert!(!config.include_location);
    }

    #[test]
    fn test_second_init_is_refused() {
        init(LogConfig::default());
        assert!(!init(LogConfig::default()));
    }
}
