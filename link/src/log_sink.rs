//! Attachable log sink for client diagnostics.
//!
//! By default every record goes to the [`log`] facade, so whatever backend
//! the application installs (`env_logger`, ...) receives it. Registering a
//! callback with [`LogSink::on_log`] redirects records to the callback
//! instead.
//!
//! # Example
//!
//! ```rust,no_run
//! use columnar_link::{LinkClient, LogSink};
//!
//! # fn example() -> columnar_link::Result<()> {
//! let sink = LogSink::new()
//!     .with_level(log::LevelFilter::Warn)
//!     .on_log(|record| eprintln!("[{}] {}: {}", record.level, record.module, record.message));
//!
//! let client = LinkClient::builder()
//!     .url("http://localhost:8123")
//!     .log_sink(sink)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use log::{Level, LevelFilter};
use std::fmt;
use std::sync::Arc;

/// One diagnostic record emitted by the client.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    /// Component that emitted the record (`Connection`, `Client`...)
    pub module: &'static str,
    pub message: String,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.module, self.message)
    }
}

/// Type alias for the on_log callback.
pub type OnLogCallback = Arc<dyn Fn(&LogRecord) + Send + Sync>;

/// Destination of the client's diagnostics. Cheap to clone.
#[derive(Clone)]
pub struct LogSink {
    on_log: Option<OnLogCallback>,
    level: LevelFilter,
}

impl Default for LogSink {
    fn default() -> Self {
        Self {
            on_log: None,
            level: LevelFilter::Trace,
        }
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("on_log", &self.on_log.is_some())
            .field("level", &self.level)
            .finish()
    }
}

impl LogSink {
    /// Sink forwarding to the `log` facade.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback receiving every record at or above the level.
    pub fn on_log(mut self, f: impl Fn(&LogRecord) + Send + Sync + 'static) -> Self {
        self.on_log = Some(Arc::new(f));
        self
    }

    /// Drop records below `level`. Applies to both the callback and the facade.
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    pub fn has_callback(&self) -> bool {
        self.on_log.is_some()
    }

    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    pub(crate) fn emit(&self, level: Level, module: &'static str, message: impl Into<String>) {
        if !self.enabled(level) {
            return;
        }
        let record = LogRecord {
            level,
            module,
            message: message.into(),
        };
        match &self.on_log {
            Some(cb) => cb(&record),
            None => log::log!(target: "columnar_link", level, "{}", record.message),
        }
    }

    pub(crate) fn debug(&self, module: &'static str, message: impl Into<String>) {
        self.emit(Level::Debug, module, message);
    }

    pub(crate) fn warn(&self, module: &'static str, message: impl Into<String>) {
        self.emit(Level::Warn, module, message);
    }

    pub(crate) fn error(&self, module: &'static str, message: impl Into<String>) {
        self.emit(Level::Error, module, message);
    }
}
