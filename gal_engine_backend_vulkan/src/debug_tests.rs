//! Unit tests for the validation messenger filters and counters
//!
//! No Vulkan instance required.

use super::*;
use serial_test::serial;

fn config(severity: DebugSeverity) -> Config {
    Config {
        severity,
        output: DebugOutput::Console,
        message_filter: DebugMessageFilter::default(),
        break_on_error: false,
        panic_on_error: false,
        enable_stats: true,
    }
}

// ============================================================================
// LEVEL / CATEGORY FILTER
// ============================================================================

#[test]
fn test_level_from_severity_flags() {
    assert_eq!(Level::of(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR), Level::Error);
    assert_eq!(Level::of(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING), Level::Warning);
    assert_eq!(Level::of(vk::DebugUtilsMessageSeverityFlagsEXT::INFO), Level::Info);
    assert_eq!(Level::of(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE), Level::Verbose);
}

#[test]
fn test_category_prefers_validation() {
    let both = vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE;
    assert_eq!(Category::of(both), Category::Validation);
    assert_eq!(Category::of(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL), Category::General);
}

#[test]
fn test_errors_only_hides_warnings() {
    let cfg = config(DebugSeverity::ErrorsOnly);
    assert!(passes(&cfg, Level::Error, Category::Validation));
    assert!(!passes(&cfg, Level::Warning, Category::Validation));
}

#[test]
fn test_errors_and_warnings_hides_info() {
    let cfg = config(DebugSeverity::ErrorsAndWarnings);
    assert!(passes(&cfg, Level::Warning, Category::General));
    assert!(!passes(&cfg, Level::Info, Category::General));
}

#[test]
fn test_category_filter_hides_performance() {
    let mut cfg = config(DebugSeverity::All);
    cfg.message_filter.show_performance = false;
    assert!(!passes(&cfg, Level::Warning, Category::Performance));
    assert!(passes(&cfg, Level::Warning, Category::Validation));
}

#[test]
fn test_severity_flags_grow_with_level() {
    assert_eq!(severity_flags(DebugSeverity::ErrorsOnly), vk::DebugUtilsMessageSeverityFlagsEXT::ERROR);
    assert!(severity_flags(DebugSeverity::All).contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
    assert!(!severity_flags(DebugSeverity::ErrorsAndWarnings).contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));
}

#[test]
fn test_config_from_device_config() {
    let device_config = DeviceConfig {
        debug_severity: DebugSeverity::All,
        debug_output: DebugOutput::File("validation.log".to_string()),
        panic_on_error: true,
        ..DeviceConfig::default()
    };
    let cfg = Config::from_device_config(&device_config);
    assert_eq!(cfg.severity, DebugSeverity::All);
    assert_eq!(cfg.output, DebugOutput::File("validation.log".to_string()));
    assert!(cfg.panic_on_error);
}

// ============================================================================
// FORMATTING
// ============================================================================

#[test]
fn test_plain_report_lists_named_objects() {
    let objects = vec!["BUFFER \"terrain vertices\"".to_string()];
    let report = format_report(Level::Warning, Category::Performance, 3, "VUID-x", "slow path", &objects);
    assert!(report.plain.starts_with("[VULKAN WARNING] [Performance] [×3]"));
    assert!(report.plain.contains("Objects: BUFFER \"terrain vertices\""));
    assert!(report.plain.contains("└─ slow path"));
}

#[test]
fn test_plain_report_without_repeat_or_objects() {
    let report = format_report(Level::Error, Category::Validation, 1, "VUID-y", "bad layout", &[]);
    assert!(!report.plain.contains('×'));
    assert!(!report.plain.contains("Objects"));
}

// ============================================================================
// MESSAGE GROUPING / STATISTICS
// ============================================================================

#[test]
fn test_message_groups_count_repeats() {
    let mut groups = MessageGroups::default();
    assert_eq!(groups.record("a"), 1);
    assert_eq!(groups.record("a"), 2);
    assert_eq!(groups.record("b"), 1);
    assert_eq!(groups.repeated(), 1);
}

#[test]
#[serial]
fn test_init_resets_validation_stats() {
    count(Level::Error);
    init_debug_config(config(DebugSeverity::All));
    assert_eq!(get_validation_stats().total(), 0);
    cleanup_debug_config();
}

#[test]
#[serial]
fn test_stats_count_by_level() {
    init_debug_config(config(DebugSeverity::All));
    count(Level::Error);
    count(Level::Warning);
    count(Level::Warning);
    count(Level::Verbose);

    let stats = get_validation_stats();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.warnings, 2);
    assert_eq!(stats.info, 0);
    assert_eq!(stats.verbose, 1);
    assert_eq!(stats.total(), 4);
    cleanup_debug_config();
}
