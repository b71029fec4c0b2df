//! Progress logging for the load pipeline.
//!
//! Lines go to stderr; stdout is reserved for CLI reports. The CLI's
//! `--quiet` flag silences everything but warnings.

use std::sync::atomic::{AtomicBool, Ordering};

static QUIET: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
}

/// Only warnings are printed while quiet.
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet, Ordering::Relaxed);
}

fn render(level: LogLevel, indent: u8, message: &str) -> String {
    let marker = match level {
        LogLevel::Info => "   ",
        LogLevel::Success => "   ✓",
        LogLevel::Warning => "   ⚠️",
    };
    format!("{}{} {}", "   ".repeat(indent as usize), marker, message)
}

fn emit(level: LogLevel, indent: u8, message: String) {
    if level != LogLevel::Warning && QUIET.load(Ordering::Relaxed) {
        return;
    }
    eprintln!("{}", render(level, indent, &message));
}

pub fn log_info(msg: impl Into<String>) {
    emit(LogLevel::Info, 0, msg.into());
}

pub fn log_success(msg: impl Into<String>) {
    emit(LogLevel::Success, 0, msg.into());
}

pub fn log_warning(msg: impl Into<String>) {
    emit(LogLevel::Warning, 0, msg.into());
}

/// Info line nested under the previous step.
pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    emit(LogLevel::Info, indent, msg.into());
}
