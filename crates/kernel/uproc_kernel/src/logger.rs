//! Console logger for the `log` facade.

use std::{env, io::Write as _, str::FromStr as _};

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Environment variable read when no level is configured.
pub const LOG_ENV: &str = "UPROC_LOG";

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let color = match record.level() {
            Level::Error => 31, // Red
            Level::Warn => 93,  // BrightYellow
            Level::Info => 34,  // Blue
            Level::Debug => 32, // Green
            Level::Trace => 90, // BrightBlack
        };
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "\u{1B}[{}m[{:>5}] {}\u{1B}[0m",
            color,
            record.level(),
            record.args(),
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_from_env() -> Option<LevelFilter> {
    let value = env::var(LOG_ENV).ok()?;
    LevelFilter::from_str(value.trim()).ok()
}

/// Installs the kernel logger.
///
/// The logger is process-global; installing it again only updates the level.
pub fn init(level: Option<LevelFilter>) {
    let level = level.or_else(level_from_env).unwrap_or(LevelFilter::Warn);
    // Another logger may already be installed by the host; keep it.
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(level);
}
