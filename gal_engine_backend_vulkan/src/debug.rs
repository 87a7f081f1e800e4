//! Validation layer messenger
//!
//! Filters `VK_EXT_debug_utils` messages by level and category, prints them
//! (console with colors, file or both), counts them per level and groups
//! repeated messages. Objects named through `Device::set_debug_name` show up
//! in every message that mentions them.

use ash::vk;
use colored::*;
use gal_engine::gal::{DebugMessageFilter, DebugOutput, DebugSeverity, DeviceConfig, ValidationStats};
use rustc_hash::FxHashMap;
use std::borrow::Cow;
use std::ffi::CStr;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::raw::{c_char, c_void};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Messenger state read by the callback (`None` outside a device lifetime)
static MESSENGER: Mutex<Option<MessengerState>> = Mutex::new(None);

/// Message counters indexed by `Level`
static COUNTERS: [AtomicU32; 4] = [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)];

/// Messenger settings of one device
#[derive(Debug, Clone)]
pub struct Config {
    pub severity: DebugSeverity,
    pub output: DebugOutput,
    pub message_filter: DebugMessageFilter,
    pub break_on_error: bool,
    pub panic_on_error: bool,
    pub enable_stats: bool,
}

impl Config {
    pub fn from_device_config(config: &DeviceConfig) -> Self {
        Self {
            severity: config.debug_severity,
            output: config.debug_output.clone(),
            message_filter: config.debug_message_filter,
            break_on_error: config.break_on_validation_error,
            panic_on_error: config.panic_on_error,
            enable_stats: config.enable_validation_stats,
        }
    }
}

struct MessengerState {
    config: Config,
    groups: MessageGroups,
}

// ===== LEVELS AND CATEGORIES =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Error = 0,
    Warning = 1,
    Info = 2,
    Verbose = 3,
}

impl Level {
    fn of(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            Level::Error
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            Level::Warning
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            Level::Info
        } else {
            Level::Verbose
        }
    }

    fn label(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Info => "INFO",
            Level::Verbose => "VERBOSE",
        }
    }

    fn colored(self) -> ColoredString {
        match self {
            Level::Error => self.label().red().bold(),
            Level::Warning => self.label().yellow().bold(),
            Level::Info => self.label().cyan(),
            Level::Verbose => self.label().bright_black(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Validation,
    Performance,
    General,
}

impl Category {
    fn of(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> Self {
        if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
            Category::Validation
        } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
            Category::Performance
        } else {
            Category::General
        }
    }

    fn label(self) -> &'static str {
        match self {
            Category::Validation => "Validation",
            Category::Performance => "Performance",
            Category::General => "General",
        }
    }
}

/// Severity flags the messenger subscribes to
pub(crate) fn severity_flags(severity: DebugSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    let mut flags = vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    if severity != DebugSeverity::ErrorsOnly {
        flags |= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING;
    }
    if severity == DebugSeverity::All {
        flags |= vk::DebugUtilsMessageSeverityFlagsEXT::INFO | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE;
    }
    flags
}

/// Whether a message passes the level and category filters
fn passes(config: &Config, level: Level, category: Category) -> bool {
    let level_ok = match config.severity {
        DebugSeverity::ErrorsOnly => level == Level::Error,
        DebugSeverity::ErrorsAndWarnings => matches!(level, Level::Error | Level::Warning),
        DebugSeverity::All => true,
    };
    level_ok
        && match category {
            Category::Validation => config.message_filter.show_validation,
            Category::Performance => config.message_filter.show_performance,
            Category::General => config.message_filter.show_general,
        }
}

// ===== STATISTICS =====

/// Occurrences of each distinct message text
#[derive(Default)]
struct MessageGroups {
    seen: FxHashMap<String, u32>,
}

impl MessageGroups {
    /// Count one occurrence and return the running total
    fn record(&mut self, message: &str) -> u32 {
        let count = self.seen.entry(message.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Number of distinct messages seen more than once
    fn repeated(&self) -> usize {
        self.seen.values().filter(|&&count| count > 1).count()
    }
}

fn count(level: Level) {
    COUNTERS[level as usize].fetch_add(1, Ordering::Relaxed);
}

fn reset_counters() {
    for counter in &COUNTERS {
        counter.store(0, Ordering::Relaxed);
    }
}

/// Install the messenger settings of a new device and reset the statistics
pub fn init_debug_config(config: Config) {
    reset_counters();
    if let Ok(mut guard) = MESSENGER.lock() {
        *guard = Some(MessengerState { config, groups: MessageGroups::default() });
    }
}

/// Late callbacks during teardown are ignored once this ran
pub fn cleanup_debug_config() {
    if let Ok(mut guard) = MESSENGER.lock() {
        *guard = None;
    }
}

pub fn get_validation_stats() -> ValidationStats {
    let load = |level: Level| COUNTERS[level as usize].load(Ordering::Relaxed);
    ValidationStats {
        errors: load(Level::Error),
        warnings: load(Level::Warning),
        info: load(Level::Info),
        verbose: load(Level::Verbose),
    }
}

/// Print the counters of the current device to stdout
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();
    if stats.total() == 0 {
        println!("\n{}", "✓ No validation messages".green().bold());
        return;
    }

    println!("\n{}", "=== GAL validation report ===".bright_blue().bold());
    let rows = [
        (Level::Error, stats.errors),
        (Level::Warning, stats.warnings),
        (Level::Info, stats.info),
        (Level::Verbose, stats.verbose),
    ];
    for (level, value) in rows.iter().filter(|(_, value)| *value > 0) {
        println!("  {}: {}", level.colored(), value);
    }
    println!("  {}: {}", "TOTAL".white().bold(), stats.total());

    let repeated = MESSENGER
        .lock()
        .ok()
        .and_then(|guard| guard.as_ref().map(|state| state.groups.repeated()))
        .unwrap_or(0);
    if repeated > 0 {
        println!("  {} distinct message(s) repeated", repeated);
    }
    println!();
}

// ===== CALLBACK =====

unsafe fn text<'a>(ptr: *const c_char, fallback: &'a str) -> Cow<'a, str> {
    if ptr.is_null() {
        Cow::Borrowed(fallback)
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

/// Debug names of the objects a message refers to
unsafe fn object_names(data: &vk::DebugUtilsMessengerCallbackDataEXT<'_>) -> Vec<String> {
    if data.p_objects.is_null() {
        return Vec::new();
    }
    std::slice::from_raw_parts(data.p_objects, data.object_count as usize)
        .iter()
        .filter(|object| !object.p_object_name.is_null())
        .map(|object| format!("{:?} \"{}\"", object.object_type, text(object.p_object_name, "")))
        .collect()
}

/// One formatted message, console and file flavours
struct Report {
    console: String,
    plain: String,
}

fn format_report(level: Level, category: Category, repeat: u32, id: &str, message: &str, objects: &[String]) -> Report {
    let repeat = if repeat > 1 { format!(" [×{}]", repeat) } else { String::new() };
    let objects = if objects.is_empty() { String::new() } else { format!("\n  ├─ Objects: {}", objects.join(", ")) };
    let console = format!(
        "{} {}{}\n  ├─ {}{}\n  └─ {}\n",
        format!("[VULKAN {}]", level.colored()).bright_blue().bold(),
        format!("[{}]", category.label()).bright_black(),
        repeat.yellow(),
        id.white(),
        objects.bright_black(),
        message.white()
    );
    let plain = format!(
        "[VULKAN {}] [{}]{}\n  ├─ {}{}\n  └─ {}\n",
        level.label(),
        category.label(),
        repeat,
        id,
        objects,
        message
    );
    Report { console, plain }
}

fn append_to_file(path: &str, text: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{}", text);
    }
}

/// Debug messenger callback installed on the instance
pub unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }
    let data = &*p_callback_data;
    let level = Level::of(message_severity);
    let category = Category::of(message_type);
    let message = text(data.p_message, "No message");

    let (config, repeat) = {
        let Ok(mut guard) = MESSENGER.lock() else {
            return vk::FALSE;
        };
        let Some(state) = guard.as_mut() else {
            return vk::FALSE;
        };
        if !passes(&state.config, level, category) {
            return vk::FALSE;
        }
        let repeat = if state.config.enable_stats {
            count(level);
            state.groups.record(&message)
        } else {
            1
        };
        (state.config.clone(), repeat)
    };

    let id = text(data.p_message_id_name, "Unknown");
    let report = format_report(level, category, repeat, &id, &message, &object_names(data));
    match &config.output {
        DebugOutput::Console => eprint!("{}", report.console),
        DebugOutput::File(path) => append_to_file(path, &report.plain),
        DebugOutput::Both(path) => {
            eprint!("{}", report.console);
            append_to_file(path, &report.plain);
        }
    }

    if level == Level::Error && config.panic_on_error {
        panic!("Vulkan validation error {}: {}", id, message);
    }
    if level == Level::Error && config.break_on_error {
        eprintln!("{}", "Validation error with break_on_validation_error set, aborting".red().bold());
        std::process::abort();
    }
    vk::FALSE
}

#[cfg(test)]
#[path = "debug_tests.rs"]
mod tests;
