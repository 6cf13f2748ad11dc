//! Console logger
//!
//! Installs a `log` facade backend that writes a coloured level prefix and
//! the record target to stderr, keeping stdout free for command output.

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level_str = match record.level() {
            Level::Error => "\x1b[31mERROR\x1b[0m",
            Level::Warn => "\x1b[33m WARN\x1b[0m",
            Level::Info => "\x1b[32m INFO\x1b[0m",
            Level::Debug => "\x1b[36mDEBUG\x1b[0m",
            Level::Trace => "TRACE",
        };
        eprintln!("[{}] {}: {}", level_str, record.target(), record.args());
    }

    fn flush(&self) {}
}

/// Install the logger; must be called once, before any log event
pub fn init() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(LevelFilter::Info);
    Ok(())
}
