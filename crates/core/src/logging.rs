//! Centralized logging configuration for the display-list tools.
//!
//! # Architecture
//!
//! - **LogConfig**: Thread-safe global configuration using atomic operations
//! - **LogLevel**: Hierarchical log levels (Off < Error < Warn < Info < Debug < Trace)
//! - **LogCategory**: Decoder subsystems (Interpreter, Vertex, Matrix, Texture, Memory, Stubs)
//! - **log()**: Common logging function for all output, with optional async file I/O
//!
//! Messages are built lazily: the closure passed to [`log`] only runs when the
//! category/level pair is enabled and the per-category rate limit allows it.
//! File output goes through a background writer thread so a decode session
//! never blocks on disk.
//!
//! # Usage
//!
//! ```rust
//! use gbi_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Interpreter, LogLevel::Debug, || {
//!     format!("unknown opcode {:02X} at {:08X}", 0xBF, 0x0600_0010)
//! });
//! ```

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Log category for the decoder subsystems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Instruction dispatch, sub-list calls, guards
    Interpreter,
    /// Vertex loads and triangle emission
    Vertex,
    /// Matrix loads and stack traffic
    Matrix,
    /// Tile setup, palette loads, pixel decoding, texture cache
    Texture,
    /// Segmented address resolution and image loading
    Memory,
    /// Recognized but deliberately unimplemented instructions
    Stubs,
}

impl LogCategory {
    /// Number of categories
    pub const COUNT: usize = 6;

    /// Every category, in index order
    pub const ALL: [LogCategory; Self::COUNT] = [
        LogCategory::Interpreter,
        LogCategory::Vertex,
        LogCategory::Matrix,
        LogCategory::Texture,
        LogCategory::Memory,
        LogCategory::Stubs,
    ];

    fn index(self) -> usize {
        match self {
            LogCategory::Interpreter => 0,
            LogCategory::Vertex => 1,
            LogCategory::Matrix => 2,
            LogCategory::Texture => 3,
            LogCategory::Memory => 4,
            LogCategory::Stubs => 5,
        }
    }
}

/// Per-category sliding window state
#[derive(Default)]
struct Window {
    timestamps: VecDeque<Instant>,
    dropped: usize,
    last_drop_report: Option<Instant>,
}

/// Rate limiter for controlling log output frequency per category
///
/// Uses a one second sliding window per category.
struct RateLimiter {
    max_logs_per_second: AtomicUsize,
    window_duration: Duration,
    windows: Mutex<[Window; LogCategory::COUNT]>,
}

impl RateLimiter {
    fn new(max_logs_per_second: usize) -> Self {
        Self {
            max_logs_per_second: AtomicUsize::new(max_logs_per_second),
            window_duration: Duration::from_secs(1),
            windows: Mutex::new(Default::default()),
        }
    }

    fn set_max_logs_per_second(&self, max: usize) {
        self.max_logs_per_second.store(max, Ordering::Relaxed);
    }

    fn get_max_logs_per_second(&self) -> usize {
        self.max_logs_per_second.load(Ordering::Relaxed)
    }

    /// Returns (allowed, dropped_count) where dropped_count is Some(n) when a
    /// drop summary is due for this category
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = &mut windows[category.index()];

        while let Some(&front) = window.timestamps.front() {
            if now.duration_since(front) > self.window_duration {
                window.timestamps.pop_front();
            } else {
                break;
            }
        }

        if window.timestamps.len() < self.get_max_logs_per_second() {
            window.timestamps.push_back(now);
            if window.dropped > 0 {
                let dropped = std::mem::take(&mut window.dropped);
                window.last_drop_report = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        window.dropped += 1;
        let report_due = match window.last_drop_report {
            None => true,
            Some(last) => now.duration_since(last) >= self.window_duration,
        };
        if report_due {
            let dropped = std::mem::take(&mut window.dropped);
            window.last_drop_report = Some(now);
            (false, Some(dropped))
        } else {
            (false, None)
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    /// Applies to every category whose own level is Off
    global_level: AtomicU8,
    /// Category overrides, indexed by `LogCategory::index`
    category_levels: [AtomicU8; LogCategory::COUNT],
    log_sender: Mutex<Option<Sender<String>>>,
    file_logging_enabled: AtomicBool,
    rate_limiter: RateLimiter,
}

impl LogConfig {
    /// Create a new LogConfig with all logging disabled and a 60 logs/second rate limit
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            category_levels: Default::default(),
            log_sender: Mutex::new(None),
            file_logging_enabled: AtomicBool::new(false),
            rate_limiter: RateLimiter::new(60),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    /// Set log level for a specific category
    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.category_levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    /// Get log level for a specific category
    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.category_levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category-specific level wins when set; otherwise the global level applies.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        match self.get_level(category) {
            LogLevel::Off => level <= self.get_global_level(),
            category_level => level <= category_level,
        }
    }

    /// Reset all logging to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    /// Set the maximum logs per second per category
    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .set_max_logs_per_second(max_logs_per_second);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.get_max_logs_per_second()
    }

    /// Route log output to a file through a background writer thread.
    ///
    /// Replaces any previously configured file; the old writer thread exits
    /// once its sender is dropped.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("gbi-log-writer".to_string())
            .spawn(move || {
                let mut file = file;
                while let Ok(message) = receiver.recv() {
                    let _ = writeln!(file, "{}", message);
                    let _ = file.flush();
                }
            })?;

        *self.sender_slot() = Some(sender);
        self.file_logging_enabled.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Stop logging to file and fall back to stderr
    pub fn clear_log_file(&self) {
        *self.sender_slot() = None;
        self.file_logging_enabled.store(false, Ordering::Relaxed);
    }

    fn sender_slot(&self) -> std::sync::MutexGuard<'_, Option<Sender<String>>> {
        match self.log_sender.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_message(&self, message: &str) {
        if self.file_logging_enabled.load(Ordering::Relaxed) {
            let sent = self
                .sender_slot()
                .as_ref()
                .is_some_and(|sender| sender.send(message.to_string()).is_ok());
            if sent {
                return;
            }
        }
        eprintln!("{}", message);
    }
}

/// Log a message with the specified category and level
///
/// The closure is only evaluated when the category/level is enabled and the
/// rate limiter admits the message. When messages were dropped, a one-line
/// summary is written first.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    let (allowed, dropped_count) = config.rate_limiter.should_allow(category);
    if let Some(count) = dropped_count.filter(|&count| count > 0) {
        config.write_message(&format!(
            "[{:?}] WARNING: Rate limit exceeded, {} log message(s) dropped in the last second",
            category, count
        ));
    }

    if allowed {
        let message = message_fn();
        config.write_message(&format!("[{:?}] {}", category, message));
    }
}
