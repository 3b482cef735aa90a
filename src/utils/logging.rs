//! Tracing subscriber setup.
//!
//! The level follows the saved log mode (`info` for minimal, `debug` for
//! verbose) unless `RUST_LOG` is set, and can be switched at runtime when
//! the user changes the setting.

use tracing::debug;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::core::LogMode;

/// Switches the active log level after startup.
#[derive(Clone)]
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogControl {
    pub fn apply(&self, mode: LogMode) {
        if let Err(e) = self.handle.reload(filter_for(mode)) {
            // Only fails once the subscriber is gone, i.e. during shutdown.
            eprintln!("Failed to change log level: {e}");
            return;
        }
        debug!("Log level set for {:?} mode", mode);
    }
}

/// Installs the global subscriber with the compact formatter.
///
/// Returns `None` if a subscriber was already installed.
pub fn init_logging(mode: LogMode) -> Option<LogControl> {
    let (filter, handle) = reload::Layer::new(filter_for(mode));
    let formatter = fmt::layer()
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stdout)
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(formatter)
        .try_init()
        .ok()
        .map(|()| LogControl { handle })
}

fn filter_for(mode: LogMode) -> EnvFilter {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::new(match mode {
        LogMode::Minimal => "info",
        LogMode::Verbose => "debug",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_follows_log_mode() {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        assert_eq!(filter_for(LogMode::Minimal).to_string(), "info");
        assert_eq!(filter_for(LogMode::Verbose).to_string(), "debug");
    }
}
