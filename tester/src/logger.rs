// Minimal `log` backend printing coloured level badges to stderr, keeping stdout for results

use log::{Level, LevelFilter, Log, Metadata, Record};
use owo_colors::OwoColorize;

struct Logger;

static LOGGER: Logger = Logger;

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let badge = match record.level() {
            Level::Error => " ERROR ".black().on_red().to_string(),
            Level::Warn => " WARN ".black().on_yellow().to_string(),
            Level::Info => " INFO ".black().on_green().to_string(),
            Level::Debug => " DEBUG ".black().on_blue().to_string(),
            Level::Trace => " TRACE ".black().on_purple().to_string(),
        };
        eprintln!("{badge} {}", record.args());
    }

    fn flush(&self) {}
}

/// Warnings by default, each `-v` adds a level and each `-q` removes one
pub(crate) fn level_filter(verbose: u8, quiet: u8) -> LevelFilter {
    match 2 + i16::from(verbose) - i16::from(quiet) {
        i16::MIN..=0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

pub(crate) fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
