//! Diagnostics for the memfs workspace
//!
//! Provides lightweight, configurable logging across all crates in the project.
//!
//! Usage:
//! - Set MEMFS_LOG=off (default) - no logs
//! - Set MEMFS_LOG=info - lifecycle events (init, clear, open, close)
//! - Set MEMFS_LOG=debug - arena growth, inode and descriptor churn

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable consulted by [`init_diagnostics`].
pub const LOG_ENV: &str = "MEMFS_LOG";

static INIT: Once = Once::new();

/// A parsed `MEMFS_LOG` value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogSetting {
    Off,
    Min(emit::Level),
}

/// Parse a `MEMFS_LOG` value. Returns `None` for unrecognized values.
pub fn parse_level(value: &str) -> Option<LogSetting> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "off" => Some(LogSetting::Off),
        "debug" => Some(LogSetting::Min(emit::Level::Debug)),
        "info" => Some(LogSetting::Min(emit::Level::Info)),
        "warn" => Some(LogSetting::Min(emit::Level::Warn)),
        "error" => Some(LogSetting::Min(emit::Level::Error)),
        _ => None,
    }
}

/// Initialize diagnostics based on the MEMFS_LOG environment variable
///
/// Safe to call multiple times - subsequent calls are ignored.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let raw = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());

        let level = match parse_level(&raw) {
            Some(LogSetting::Off) => return,
            Some(LogSetting::Min(level)) => level,
            None => {
                // Bootstrap warning, the emitter does not exist yet
                #[allow(clippy::print_stderr)]
                {
                    eprintln!("Warning: Unknown {LOG_ENV} value '{raw}', using 'info'");
                }
                emit::Level::Info
            }
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level))
            .init();

        // The runtime lives for the rest of the process
        std::mem::forget(rt);
    });
}

/// Log lifecycle operations (state init/clear, open, close, unlink).
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log internal detail (arena growth, descriptor and inode churn).
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable oddities that do not stop the operation.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log broken invariants, typically right before a fatal abort.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

// Short-name versions

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;
