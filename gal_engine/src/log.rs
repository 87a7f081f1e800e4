//! GAL logging
//!
//! Every crate of the workspace logs through one global `Logger` using the
//! `engine_*!` macros exported at the crate root. Messages below the
//! minimum severity are dropped before formatting, so the per-command
//! `engine_trace!` calls of the submission path cost nothing when disabled.
//!
//! The default logger prints colored lines to stdout:
//! `[timestamp] [SEVERITY] [source] message (file:line)`, where the location
//! is only present for errors.

use chrono::{DateTime, Local};
use colored::*;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{OnceLock, RwLock};
use std::time::SystemTime;

/// Destination of GAL log entries
///
/// ```no_run
/// use gal_engine::gal::log::{set_logger, LogEntry, Logger};
///
/// struct EditorConsole;
///
/// impl Logger for EditorConsole {
///     fn log(&self, entry: &LogEntry) {
///         // forward to the editor's console panel
///         let _ = (&entry.source, &entry.message);
///     }
/// }
///
/// set_logger(EditorConsole);
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Emitting component, e.g. `"gal::Device"` or `"gal::vulkan"`
    pub source: String,
    pub message: String,
    /// Call site, filled in for errors
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogSeverity {
    const ALL: [LogSeverity; 5] = [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ];

    fn tag(self) -> ColoredString {
        match self {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        }
    }
}

/// Colored console logger installed until `set_logger` replaces it
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let time: DateTime<Local> = entry.timestamp.into();
        let location = match (entry.file, entry.line) {
            (Some(file), Some(line)) => format!(" ({}:{})", file, line),
            _ => String::new(),
        };
        println!(
            "[{}] [{}] [{}] {}{}",
            time.format("%H:%M:%S%.3f"),
            entry.severity.tag(),
            entry.source.bright_blue(),
            entry.message,
            location.bright_black()
        );
    }
}

// ===== GLOBAL STATE =====

static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

/// Lowest severity forwarded to the logger (index into `LogSeverity::ALL`)
static MIN_SEVERITY: AtomicU8 = AtomicU8::new(0);

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

pub fn set_logger<L: Logger + 'static>(new_logger: L) {
    if let Ok(mut guard) = logger().write() {
        *guard = Box::new(new_logger);
    }
}

/// Reinstall `DefaultLogger` and forward every severity again
pub fn reset_logger() {
    set_logger(DefaultLogger);
    set_min_severity(LogSeverity::Trace);
}

/// Drop messages below `severity`
pub fn set_min_severity(severity: LogSeverity) {
    MIN_SEVERITY.store(severity as u8, Ordering::Relaxed);
}

pub fn min_severity() -> LogSeverity {
    let index = MIN_SEVERITY.load(Ordering::Relaxed) as usize;
    LogSeverity::ALL[index.min(LogSeverity::ALL.len() - 1)]
}

/// Whether a message of this severity reaches the logger
pub fn enabled(severity: LogSeverity) -> bool {
    severity >= min_severity()
}

pub fn log(severity: LogSeverity, source: &str, message: String) {
    emit(severity, source, message, None);
}

/// Log with the call site attached
pub fn log_detailed(severity: LogSeverity, source: &str, message: String, file: &'static str, line: u32) {
    emit(severity, source, message, Some((file, line)));
}

fn emit(severity: LogSeverity, source: &str, message: String, location: Option<(&'static str, u32)>) {
    if !enabled(severity) {
        return;
    }
    let entry = LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: source.to_string(),
        message,
        file: location.map(|(file, _)| file),
        line: location.map(|(_, line)| line),
    };
    let guard = logger().read().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.log(&entry);
}

// ===== MACROS =====

#[doc(hidden)]
#[macro_export]
macro_rules! __engine_log {
    ($severity:ident, $source:expr, $($arg:tt)*) => {
        if $crate::log::enabled($crate::log::LogSeverity::$severity) {
            $crate::log::log($crate::log::LogSeverity::$severity, $source, format!($($arg)*))
        }
    };
}

/// ```no_run
/// gal_engine::engine_trace!("gal::vulkan", "Recorded {} commands", 12);
/// ```
#[macro_export]
macro_rules! engine_trace {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Trace, $source, $($arg)*) };
}

#[macro_export]
macro_rules! engine_debug {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Debug, $source, $($arg)*) };
}

#[macro_export]
macro_rules! engine_info {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Info, $source, $($arg)*) };
}

#[macro_export]
macro_rules! engine_warn {
    ($source:expr, $($arg:tt)*) => { $crate::__engine_log!(Warn, $source, $($arg)*) };
}

/// Error with the call site attached
///
/// ```no_run
/// # let error = "VK_ERROR_OUT_OF_DEVICE_MEMORY";
/// gal_engine::engine_error!("gal::vulkan", "Texture allocation failed: {}", error);
/// ```
#[macro_export]
macro_rules! engine_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

// ===== ERROR HELPERS =====

/// Log an error and evaluate to `Error::BackendError` with the same text
///
/// ```no_run
/// # fn f() -> gal_engine::Error {
/// gal_engine::engine_err!("gal::vulkan", "vkCreateBuffer failed: {}", -2)
/// # }
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::error::Error::BackendError(message)
    }};
}

/// Like `engine_err!`, logged as a warning
#[macro_export]
macro_rules! engine_warn_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_warn!($source, "{}", message);
        $crate::error::Error::BackendError(message)
    }};
}

/// Log an error and return it from the enclosing function
///
/// `engine_bail!(SOURCE, "...")` returns `Error::BackendError`;
/// `engine_bail!(SOURCE, Error::InvalidResource => "...")` picks the variant.
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $kind:path => $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        return Err($kind(message));
    }};
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

/// `engine_bail!` logged as a warning
#[macro_export]
macro_rules! engine_bail_warn {
    ($source:expr, $kind:path => $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_warn!($source, "{}", message);
        return Err($kind(message));
    }};
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_warn_err!($source, $($arg)*))
    };
}
