/*
================================================================================
                          atlas_batcher Logging System
================================================================================

Standard logging through the `log` facade (debug!, info!, ...):

- `BufferLogger`: keeps the last 1000 crate log lines in memory for export
- `CompositeLogger`: console output (env_logger) plus buffer capture
- `setup_logger()`: installs the composite logger with the default filters
- `export_debug_logs()`: writes the buffered lines to <data_dir>/atlas_batcher/logs/debug.log
- `setup_panic_hook()`: writes panics with a backtrace and the buffered lines to panic.log

Log levels:
- Debug builds: DEBUG and above for this crate
- Release builds: ERROR only
- RUST_LOG, when set, replaces both defaults

================================================================================
*/

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use env_logger::fmt::{Color, Formatter};
use log::{LevelFilter, Metadata, Record};
use once_cell::sync::Lazy;

#[allow(unused_imports)]
use log::{Level, debug, info, warn, error};

const MAX_LOG_LINES: usize = 1000;
const CRATE_TARGET: &str = "atlas_batcher";

pub type LogBuffer = Arc<Mutex<VecDeque<String>>>;

// Shared by every logger instance so the buffer survives repeated setup calls
static LOG_BUFFER: Lazy<LogBuffer> = Lazy::new(|| {
    Arc::new(Mutex::new(VecDeque::with_capacity(MAX_LOG_LINES)))
});

struct BufferLogger {
    log_buffer: LogBuffer,
}

impl BufferLogger {
    fn new() -> Self {
        Self {
            log_buffer: Arc::clone(&LOG_BUFFER),
        }
    }

    fn log_to_buffer(&self, message: &str, target: &str, line: Option<u32>) {
        let Ok(mut buffer) = self.log_buffer.lock() else {
            return;
        };

        if buffer.len() == MAX_LOG_LINES {
            buffer.pop_front();
        }

        // The module is already in the target in most cases
        let formatted_message = if let Some(line_num) = line {
            format!("{target}:{line_num} {message}")
        } else {
            format!("{target} {message}")
        };

        buffer.push_back(formatted_message);
    }

    fn get_shared_buffer(&self) -> LogBuffer {
        Arc::clone(&self.log_buffer)
    }
}

impl log::Log for BufferLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.target().starts_with(CRATE_TARGET) && metadata.level() <= LevelFilter::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let message = format!("{:<5} {}", record.level(), record.args());
            self.log_to_buffer(&message, record.target(), record.line());
        }
    }

    fn flush(&self) {}
}

struct CompositeLogger {
    console_logger: env_logger::Logger,
    buffer_logger: BufferLogger,
}

impl log::Log for CompositeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console_logger.enabled(metadata) || self.buffer_logger.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.console_logger.enabled(record.metadata()) {
            self.console_logger.log(record);
        }
        if self.buffer_logger.enabled(record.metadata()) {
            self.buffer_logger.log(record);
        }
    }

    fn flush(&self) {
        self.console_logger.flush();
        self.buffer_logger.flush();
    }
}

fn format_record(buf: &mut Formatter, record: &Record) -> std::io::Result<()> {
    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

    let module_info = if let (Some(module), Some(line)) = (record.module_path(), record.line()) {
        format!("{module}:{line}")
    } else if let Some(module) = record.module_path() {
        module.to_string()
    } else if let Some(line) = record.line() {
        format!("line:{line}")
    } else {
        "unknown".to_string()
    };

    let mut level_style = buf.style();
    let mut meta_style = buf.style();

    match record.level() {
        Level::Error => level_style.set_color(Color::Red).set_bold(true),
        Level::Warn => level_style.set_color(Color::Yellow).set_bold(true),
        Level::Info => level_style.set_color(Color::Green).set_bold(true),
        Level::Debug => level_style.set_color(Color::Blue).set_bold(true),
        Level::Trace => level_style.set_color(Color::White),
    };

    #[cfg(target_os = "macos")]
    {
        // Color::Rgb does not work on macOS
        meta_style.set_color(Color::Blue);
    }

    #[cfg(not(target_os = "macos"))]
    {
        meta_style.set_color(Color::Rgb(120, 120, 120));
    }

    writeln!(
        buf,
        "{} {} {} {}",
        meta_style.value(timestamp),
        level_style.value(record.level()),
        meta_style.value(module_info),
        record.args()
    )
}

/// Installs the console + buffer logger and returns the shared buffer.
///
/// Calling it again after a logger is installed only returns the buffer.
pub fn setup_logger() -> LogBuffer {
    let buffer_logger = BufferLogger::new();
    let shared_buffer = buffer_logger.get_shared_buffer();

    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    } else if cfg!(debug_assertions) {
        builder.filter(Some(CRATE_TARGET), LevelFilter::Debug);
    } else {
        builder.filter(Some(CRATE_TARGET), LevelFilter::Error);
    }

    // Filter out all other crates' logs
    builder.filter(None, LevelFilter::Off);
    builder.format(format_record);

    let composite_logger = CompositeLogger {
        console_logger: builder.build(),
        buffer_logger,
    };

    if log::set_boxed_logger(Box::new(composite_logger)).is_ok() {
        // Always set the maximum level to Trace so that filtering works correctly
        log::set_max_level(LevelFilter::Trace);
    }

    shared_buffer
}

pub fn get_log_directory() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join(CRATE_TARGET).join("logs")
}

/// Writes the buffered log lines to `debug.log` in the log directory.
pub fn export_debug_logs(log_buffer: &LogBuffer) -> Result<PathBuf, std::io::Error> {
    let log_dir_path = get_log_directory();
    std::fs::create_dir_all(&log_dir_path)?;

    let debug_log_path = log_dir_path.join("debug.log");
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&debug_log_path)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");
    writeln!(file, "{timestamp} atlas_batcher debug log ({})", crate::build_info::BuildInfo::display_version())?;

    // Copy the lines out so the lock is not held during file IO
    let lines: Vec<String> = match log_buffer.lock() {
        Ok(buffer) => buffer.iter().cloned().collect(),
        Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
    };

    for line in &lines {
        writeln!(file, "{line}")?;
    }
    file.flush()?;

    info!("Exported {} log lines to {}", lines.len(), debug_log_path.display());
    Ok(debug_log_path)
}

/// Logs panics to stderr and to `panic.log`, followed by the buffered log lines.
pub fn setup_panic_hook(log_buffer: LogBuffer) {
    let log_file_path = get_log_directory().join("panic.log");
    if let Some(parent) = log_file_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Failed to create log directory {}: {}", parent.display(), e);
        }
    }

    panic::set_hook(Box::new(move |info| {
        let backtrace = backtrace::Backtrace::new();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ");

        let location = if let Some(location) = info.location() {
            format!("{}:{}", location.file(), location.line())
        } else {
            "unknown location".to_string()
        };

        let header_msg = format!("[PANIC] at {location} - {info}");
        let backtrace_lines: Vec<String> = format!("{backtrace:?}")
            .lines()
            .map(|line| format!("[BACKTRACE] {}", line.trim()))
            .collect();

        eprintln!("\n\n{header_msg}");
        eprintln!("[PANIC] Backtrace:");
        for line in &backtrace_lines {
            eprintln!("{line}");
        }

        let written = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&log_file_path)
            .and_then(|mut file| {
                writeln!(file, "{timestamp} {header_msg}")?;
                writeln!(file, "{timestamp} [PANIC] Backtrace:")?;
                for line in &backtrace_lines {
                    writeln!(file, "{timestamp} {line}")?;
                }

                writeln!(file)?;
                writeln!(file, "{timestamp} [PANIC] Last {MAX_LOG_LINES} log entries:")?;
                if let Ok(buffer) = log_buffer.lock() {
                    for log in buffer.iter() {
                        writeln!(file, "{timestamp} {log}")?;
                    }
                }
                Ok(())
            });

        match written {
            Ok(()) => eprintln!("\nA complete crash log has been written to: {}", log_file_path.display()),
            Err(e) => eprintln!("\nFailed to write crash log {}: {}", log_file_path.display(), e),
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log;

    #[test]
    fn test_buffer_keeps_only_crate_lines() {
        let logger = BufferLogger {
            log_buffer: Arc::new(Mutex::new(VecDeque::new())),
        };

        logger.log(
            &Record::builder()
                .target("atlas_batcher::batcher")
                .level(Level::Debug)
                .line(Some(12))
                .args(format_args!("grown"))
                .build(),
        );
        logger.log(
            &Record::builder()
                .target("wgpu_core::device")
                .level(Level::Debug)
                .args(format_args!("ignored"))
                .build(),
        );

        let buffer = logger.log_buffer.lock().unwrap();
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer[0], "atlas_batcher::batcher:12 DEBUG grown");
    }

    #[test]
    fn test_buffer_is_bounded() {
        let logger = BufferLogger {
            log_buffer: Arc::new(Mutex::new(VecDeque::new())),
        };

        for i in 0..MAX_LOG_LINES + 5 {
            logger.log_to_buffer(&i.to_string(), CRATE_TARGET, None);
        }

        let buffer = logger.log_buffer.lock().unwrap();
        assert_eq!(buffer.len(), MAX_LOG_LINES);
        assert_eq!(buffer[0], "atlas_batcher 5");
    }
}
