// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Minimal structured logging with severity levels
//! OWNERS: @kernel-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! PUBLIC API: log_* macros, emit(level,target,args), set_sink, set_max_level
//! DEPENDS_ON: spin::Mutex
//! INVARIANTS: Debug/Trace only in debug builds (or `trace`); single-line emission;
//!             never called with an IrqGuard held

use core::fmt::{self, Arguments, Write};
use core::sync::atomic::{AtomicU8, Ordering};

use spin::Mutex;

/// Logging severity used by the conduit.
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl Level {
    const fn tag(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }

    const fn compiled_in(self) -> bool {
        match self {
            Level::Debug | Level::Trace => cfg!(any(debug_assertions, feature = "trace")),
            _ => true,
        }
    }
}

/// Destination for formatted log lines (UART, logd ring, test capture).
pub trait LogSink: Sync {
    /// Receives one complete line, without the trailing newline.
    fn write_line(&self, level: Level, line: &str);
}

static SINK: Mutex<Option<&'static dyn LogSink>> = Mutex::new(None);
static MAX_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Installs the process-wide sink. Lines emitted before this are dropped.
pub fn set_sink(sink: &'static dyn LogSink) {
    *SINK.lock() = Some(sink);
}

pub fn set_max_level(level: Level) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn enabled(level: Level) -> bool {
    level.compiled_in() && level as u8 <= MAX_LEVEL.load(Ordering::Relaxed)
}

const LINE_CAP: usize = 160;

/// Fixed line buffer; overlong lines are truncated, never allocated.
struct Line {
    buf: [u8; LINE_CAP],
    len: usize,
}

impl Write for Line {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = LINE_CAP - self.len;
        let mut take = s.len().min(room);
        while !s.is_char_boundary(take) {
            take -= 1;
        }
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

/// Emits a structured log line if the level is enabled.
pub fn emit(level: Level, target: &'static str, args: Arguments<'_>) {
    if !enabled(level) {
        return;
    }
    let Some(sink) = *SINK.lock() else {
        return;
    };
    let mut line = Line { buf: [0; LINE_CAP], len: 0 };
    let _ = write!(line, "[{} {}] ", level.tag(), target);
    let _ = line.write_fmt(args);
    // Truncation only ever happens on char boundaries.
    if let Ok(text) = core::str::from_utf8(&line.buf[..line.len]) {
        sink.write_line(level, text);
    }
}

#[macro_export]
macro_rules! log_error {
    (target: $target:expr, $($arg:tt)+) => {{
        $crate::log::emit($crate::log::Level::Error, $target, format_args!($($arg)+));
    }};
    ($($arg:tt)+) => {{
        $crate::log::emit($crate::log::Level::Error, module_path!(), format_args!($($arg)+));
    }};
}

#[macro_export]
macro_rules! log_warn {
    (target: $target:expr, $($arg:tt)+) => {{
        $crate::log::emit($crate::log::Level::Warn, $target, format_args!($($arg)+));
    }};
    ($($arg:tt)+) => {{
        $crate::log::emit($crate::log::Level::Warn, module_path!(), format_args!($($arg)+));
    }};
}

#[macro_export]
macro_rules! log_info {
    (target: $target:expr, $($arg:tt)+) => {{
        $crate::log::emit($crate::log::Level::Info, $target, format_args!($($arg)+));
    }};
    ($($arg:tt)+) => {{
        $crate::log::emit($crate::log::Level::Info, module_path!(), format_args!($($arg)+));
    }};
}

#[macro_export]
macro_rules! log_debug {
    (target: $target:expr, $($arg:tt)+) => {{
        $crate::log::emit($crate::log::Level::Debug, $target, format_args!($($arg)+));
    }};
    ($($arg:tt)+) => {{
        $crate::log::emit($crate::log::Level::Debug, module_path!(), format_args!($($arg)+));
    }};
}

#[macro_export]
macro_rules! log_trace {
    (target: $target:expr, $($arg:tt)+) => {{
        $crate::log::emit($crate::log::Level::Trace, $target, format_args!($($arg)+));
    }};
    ($($arg:tt)+) => {{
        $crate::log::emit($crate::log::Level::Trace, module_path!(), format_args!($($arg)+));
    }};
}
