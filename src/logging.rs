//! Kernel Logger
//!
//! Routes the `log` facade to the console collaborator. Records are tagged
//! with a colored level and the originating module.

use alloc::sync::Arc;
use core::fmt::Write;

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Once;

use crate::console::{Console, ConsoleWriter};

struct ConsoleLogger {
    console: Once<Arc<dyn Console>>,
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(console) = self.console.get() else {
            return;
        };
        let color = match record.level() {
            Level::Error => 31,
            Level::Warn => 93,
            Level::Info => 34,
            Level::Debug => 32,
            Level::Trace => 36,
        };
        let mut out = ConsoleWriter(console.as_ref());
        let _ = writeln!(
            out,
            "\u{1B}[{}m[{:>5}] {}: {}\u{1B}[0m",
            color,
            record.level(),
            record.target(),
            record.args(),
        );
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger {
    console: Once::new(),
};

/// Install the console logger.
///
/// Fails if a logger has already been installed; the level is still applied.
pub fn init(console: Arc<dyn Console>, level: LevelFilter) -> Result<(), SetLoggerError> {
    LOGGER.console.call_once(|| console);
    log::set_max_level(level);
    log::set_logger(&LOGGER)
}

/// Level selected by the `LOG` variable at build time, off when unset.
pub fn level_from_env() -> LevelFilter {
    parse_level(option_env!("LOG"))
}

fn parse_level(value: Option<&str>) -> LevelFilter {
    match value {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}
