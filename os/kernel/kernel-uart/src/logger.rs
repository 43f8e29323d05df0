use crate::{SinkWriter, Uart};
use core::fmt::Write;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend writing `[LEVEL] target: message` lines to a [`Uart`].
pub struct UartLogger {
    uart: Uart,
    max_level: LevelFilter,
}

impl UartLogger {
    #[must_use]
    pub const fn new(uart: Uart, max_level: LevelFilter) -> Self {
        Self { uart, max_level }
    }

    /// Install as the global logger. Call once during early init.
    ///
    /// # Errors
    /// A logger is already installed.
    pub fn init(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.max_level);
        Ok(())
    }
}

impl Log for UartLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Every copy drives the same registers; lines from different harts may interleave.
        let mut uart = self.uart;
        let _ = writeln!(
            SinkWriter(&mut uart),
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}
