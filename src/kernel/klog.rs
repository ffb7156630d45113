// src/kernel/klog.rs
//! Kernel logger
//!
//! Backend for the `log` facade. Each record is rendered as
//! `[LEVEL] target: message` into a fixed stack buffer and handed to the sink
//! registered by the console driver.
//!
//! # Design
//!
//! - No heap: lines longer than the buffer are truncated
//! - The sink sits behind a `spin::Mutex` held only long enough to copy the
//!   function pointer out

use core::fmt::{self, Write};

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

use crate::constants::KLOG_LINE_CAPACITY;

/// Console callback receiving one rendered line (newline included)
pub type LogSink = fn(&str);

static LOGGER: KernelLogger = KernelLogger;
static SINK: Mutex<Option<LogSink>> = Mutex::new(None);

/// `log::Log` implementation backed by the registered sink
#[derive(Debug)]
pub struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = render(record);
        // Copy the sink out so a sink that logs cannot deadlock.
        let sink = *SINK.lock();
        if let Some(sink) = sink {
            sink(line.as_str());
        }
    }

    fn flush(&self) {}
}

/// Install the kernel logger
///
/// Use [`set_sink`] to swap the sink afterwards.
///
/// # Errors
///
/// Returns `SetLoggerError` when a different logger was installed first.
pub fn init(sink: LogSink, level: LevelFilter) -> Result<(), SetLoggerError> {
    set_sink(Some(sink));
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Replace (or remove) the sink without touching the level
pub fn set_sink(sink: Option<LogSink>) {
    *SINK.lock() = sink;
}

/// Fixed-capacity line buffer
struct LineBuffer {
    buf: [u8; KLOG_LINE_CAPACITY],
    len: usize,
}

impl LineBuffer {
    const fn new() -> Self {
        Self {
            buf: [0; KLOG_LINE_CAPACITY],
            len: 0,
        }
    }

    fn as_str(&self) -> &str {
        // Only whole characters are ever copied in.
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

impl Write for LineBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // The last byte is reserved for the newline.
        let room = KLOG_LINE_CAPACITY - 1 - self.len;
        let mut take = s.len().min(room);
        while !s.is_char_boundary(take) {
            take -= 1;
        }
        self.buf[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

fn render(record: &Record) -> LineBuffer {
    let mut line = LineBuffer::new();
    let _ = write!(
        line,
        "[{}] {}: {}",
        record.level(),
        record.target(),
        record.args()
    );
    line.buf[line.len] = b'\n';
    line.len += 1;
    line
}
