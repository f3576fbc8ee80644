use std::sync::atomic::{AtomicU8, Ordering};

/// Diagnostic log levels, ordered from most to least severe
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn parse(level: &str) -> Option<Self> {
        match level.to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Whether a message at this level passes the global threshold.
    pub fn enabled(self) -> bool {
        self as u8 <= LOG_LEVEL.load(Ordering::Relaxed)
    }
}

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

pub fn set_log_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Picks the level from an environment variable, defaulting to Info when the
/// variable is unset or unrecognized.
pub fn init_log_level_from_env(var: &str) {
    let level = std::env::var(var)
        .ok()
        .and_then(|raw| LogLevel::parse(&raw))
        .unwrap_or(LogLevel::Info);
    set_log_level(level);
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if $crate::logger::LogLevel::Error.enabled() {
            eprintln!("❌ {}", format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if $crate::logger::LogLevel::Warn.enabled() {
            eprintln!("⚠️  {}", format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if $crate::logger::LogLevel::Info.enabled() {
            println!("ℹ️  {}", format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if $crate::logger::LogLevel::Debug.enabled() {
            println!("🐛 {}", format_args!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        if $crate::logger::LogLevel::Trace.enabled() {
            println!("🔍 {}", format_args!($($arg)*));
        }
    };
}
