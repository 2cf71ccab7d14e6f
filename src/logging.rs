use std::io::Write;

use chrono::Local;
use log::{LevelFilter, Metadata, Record, SetLoggerError};

static LOGGER: BridgeLogger = BridgeLogger;

/// Writes `[timestamp][LEVEL] message` lines to stderr, keeping stdout free
/// for command output. Filtering follows `log::max_level`, so the level can
/// be changed after installation.
pub struct BridgeLogger;

impl BridgeLogger {
    pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
    }

    fn format(record: &Record) -> String {
        format!(
            "[{}][{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    }
}

impl log::Log for BridgeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", Self::format(record));
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Installs [`BridgeLogger`], falling back to `env_logger` if installation fails.
pub fn init_logging(level: LevelFilter) {
    if let Err(e) = BridgeLogger::init(level) {
        eprintln!("Failed to initialize logger: {}, falling back to env_logger", e);
        let _ = env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .try_init();
    }
}

/// Changes the level once the configuration is known.
pub fn set_level(level: LevelFilter) {
    log::set_max_level(level);
}
