//! Unit tests for log.rs
//!
//! Tests LogSeverity, LogEntry, DefaultLogger, the global logger and the
//! error helper macros.

use crate::error::{Error, Result};
use crate::log::{self, DefaultLogger, LogEntry, LogSeverity, Logger};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// Captures every entry it receives
struct CaptureLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl CaptureLogger {
    fn install() -> Arc<Mutex<Vec<LogEntry>>> {
        let entries = Arc::new(Mutex::new(Vec::new()));
        log::set_logger(CaptureLogger { entries: entries.clone() });
        entries
    }
}

impl Logger for CaptureLogger {
    fn log(&self, entry: &LogEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

fn entry(severity: LogSeverity, file: Option<&'static str>, line: Option<u32>) -> LogEntry {
    LogEntry {
        severity,
        timestamp: SystemTime::now(),
        source: "gal::vulkan".to_string(),
        message: format!("{:?} message", severity),
        file,
        line,
    }
}

// ============================================================================
// LOG SEVERITY TESTS
// ============================================================================

#[test]
fn test_log_severity_ordering() {
    assert!(LogSeverity::Trace < LogSeverity::Debug);
    assert!(LogSeverity::Debug < LogSeverity::Info);
    assert!(LogSeverity::Info < LogSeverity::Warn);
    assert!(LogSeverity::Warn < LogSeverity::Error);
}

#[test]
fn test_log_severity_debug() {
    assert_eq!(format!("{:?}", LogSeverity::Trace), "Trace");
    assert_eq!(format!("{:?}", LogSeverity::Error), "Error");
}

// ============================================================================
// LOG ENTRY TESTS
// ============================================================================

#[test]
fn test_log_entry_clone_keeps_location() {
    let original = entry(LogSeverity::Error, Some("vulkan.rs"), Some(42));
    let copy = original.clone();

    assert_eq!(copy.severity, LogSeverity::Error);
    assert_eq!(copy.source, "gal::vulkan");
    assert_eq!(copy.file, Some("vulkan.rs"));
    assert_eq!(copy.line, Some(42));
}

// ============================================================================
// DEFAULT LOGGER TESTS
// ============================================================================

#[test]
fn test_default_logger_all_severities() {
    let logger = DefaultLogger;
    for severity in [
        LogSeverity::Trace,
        LogSeverity::Debug,
        LogSeverity::Info,
        LogSeverity::Warn,
        LogSeverity::Error,
    ] {
        logger.log(&entry(severity, None, None));
        logger.log(&entry(severity, Some("test.rs"), Some(7)));
    }
}

#[test]
fn test_logger_trait_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DefaultLogger>();
}

// ============================================================================
// GLOBAL LOGGER TESTS
// ============================================================================

#[test]
#[serial]
fn test_set_logger_captures_messages() {
    let entries = CaptureLogger::install();

    log::log(LogSeverity::Info, "gal::Device", "device created".to_string());
    log::log_detailed(LogSeverity::Error, "gal::Device", "boom".to_string(), "device.rs", 10);

    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].message, "device created");
        assert!(captured[0].file.is_none());
        assert_eq!(captured[1].file, Some("device.rs"));
        assert_eq!(captured[1].line, Some(10));
    }

    log::reset_logger();
}

#[test]
#[serial]
fn test_reset_logger_stops_capture() {
    let entries = CaptureLogger::install();
    log::reset_logger();

    crate::engine_info!("gal::Device", "goes to the console");

    assert!(entries.lock().unwrap().is_empty());
}

#[test]
#[serial]
fn test_engine_error_macro_records_location() {
    let entries = CaptureLogger::install();

    crate::engine_error!("gal::Device", "failed with {}", 3);

    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 1);
        assert_eq!(captured[0].severity, LogSeverity::Error);
        assert_eq!(captured[0].message, "failed with 3");
        assert!(captured[0].file.unwrap().ends_with("log_tests.rs"));
        assert!(captured[0].line.is_some());
    }

    log::reset_logger();
}

// ============================================================================
// ERROR HELPER MACRO TESTS
// ============================================================================

#[test]
#[serial]
fn test_engine_err_logs_and_builds_backend_error() {
    let entries = CaptureLogger::install();

    let err = crate::engine_err!("gal::vulkan", "vkCreateBuffer failed: {}", -2);

    assert_eq!(err, Error::BackendError("vkCreateBuffer failed: -2".to_string()));
    assert_eq!(entries.lock().unwrap()[0].severity, LogSeverity::Error);

    log::reset_logger();
}

#[test]
#[serial]
fn test_engine_warn_err_logs_as_warning() {
    let entries = CaptureLogger::install();

    let err = crate::engine_warn_err!("gal::vulkan", "debug name rejected");

    assert!(matches!(err, Error::BackendError(_)));
    assert_eq!(entries.lock().unwrap()[0].severity, LogSeverity::Warn);

    log::reset_logger();
}

#[test]
#[serial]
fn test_engine_bail_returns_early() {
    fn plain() -> Result<u32> {
        crate::engine_bail!("gal::Device", "no adapter");
    }

    fn typed(size: u64) -> Result<u64> {
        if size == 0 {
            crate::engine_bail!("gal::Device", Error::InvalidResource => "buffer size is {}", size);
        }
        Ok(size)
    }

    fn warned() -> Result<()> {
        crate::engine_bail_warn!("gal::Device", Error::InvalidCommand => "marker underflow");
    }

    let entries = CaptureLogger::install();

    assert_eq!(plain(), Err(Error::BackendError("no adapter".to_string())));
    assert_eq!(typed(0), Err(Error::InvalidResource("buffer size is 0".to_string())));
    assert_eq!(typed(16), Ok(16));
    assert_eq!(warned(), Err(Error::InvalidCommand("marker underflow".to_string())));

    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 3);
        assert_eq!(captured[2].severity, LogSeverity::Warn);
    }

    log::reset_logger();
}

// ============================================================================
// SEVERITY FILTER TESTS
// ============================================================================

#[test]
#[serial]
fn test_min_severity_drops_lower_messages() {
    let entries = CaptureLogger::install();
    log::set_min_severity(LogSeverity::Warn);

    crate::engine_trace!("gal::vulkan", "recorded {} commands", 40);
    crate::engine_info!("gal::Device", "frame started");
    crate::engine_warn!("gal::Device", "resource leaked");
    crate::engine_error!("gal::Device", "device lost");

    {
        let captured = entries.lock().unwrap();
        assert_eq!(captured.len(), 2);
        assert_eq!(captured[0].severity, LogSeverity::Warn);
        assert_eq!(captured[1].severity, LogSeverity::Error);
    }

    log::reset_logger();
}

#[test]
#[serial]
fn test_reset_logger_restores_trace() {
    log::set_min_severity(LogSeverity::Error);
    assert!(!log::enabled(LogSeverity::Info));

    log::reset_logger();
    assert_eq!(log::min_severity(), LogSeverity::Trace);
    assert!(log::enabled(LogSeverity::Trace));
}
