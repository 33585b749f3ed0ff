//! Leveled log broadcasting and hex dump rendering.
//!
//! A [`LogBroker`] fans formatted text out to a bounded set of
//! [`LogSink`]s, each with its own severity threshold and active flag.
//! Advisory lock/unlock hooks, when installed on a sink, bracket every
//! broadcast so sinks shared with interrupt context can serialize
//! access.
//!
//! A broker is typically attached to a [`Shell`](crate::session::Shell)
//! through its companion table under [`COMPANION_ID_LOG`], letting
//! command handlers reach the log plumbing of their session.

use core::fmt;
use core::fmt::Write as _;

use heapless::{String, Vec};

use crate::error::Error;
use crate::session::{HookFn, WriteFn};

/// Companion table id under which a broker is attached to a session.
pub const COMPANION_ID_LOG: i32 = -1;

/// Capacity of the broker's sink table.
pub const MAX_SINKS: usize = 4;

/// Capacity of one formatted log record.
pub const MAX_RECORD_LENGTH: usize = 256;

#[cfg(target_pointer_width = "32")]
const ADDR_DIGITS: usize = 8;
#[cfg(target_pointer_width = "64")]
const ADDR_DIGITS: usize = 16;

/// Severity scale. A sink passes records at or below its own level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogLevel {
    /// Nothing passes.
    None = 0,
    /// Unrecoverable faults.
    Error = 1,
    /// Degraded but continuing.
    Warning = 2,
    /// Normal operational notices.
    Info = 3,
    /// Diagnostic detail.
    Debug = 4,
    /// Per-event tracing.
    Verbose = 5,
    /// Everything passes.
    All = 6,
}

/// One output destination for log records.
#[derive(Debug)]
pub struct LogSink {
    /// Byte-stream write callback.
    pub write: WriteFn,
    /// Inactive sinks are skipped without level comparison.
    pub active: bool,
    /// Records above this severity are dropped for this sink.
    pub level: LogLevel,
    /// Called before this sink is written during a broadcast.
    pub lock: Option<HookFn>,
    /// Called after this sink is written during a broadcast.
    pub unlock: Option<HookFn>,
}

impl LogSink {
    /// A sink with no lock hooks, active, at the given level.
    pub const fn new(write: WriteFn, level: LogLevel) -> Self {
        LogSink {
            write,
            active: true,
            level,
            lock: None,
            unlock: None,
        }
    }
}

/// Bounded fan-out of log records to registered sinks.
#[derive(Default)]
pub struct LogBroker {
    sinks: Vec<LogSink, MAX_SINKS>,
}

impl LogBroker {
    /// A broker with no sinks.
    pub const fn new() -> Self {
        LogBroker { sinks: Vec::new() }
    }

    /// Register a sink. Returns its slot index.
    pub fn register(&mut self, sink: LogSink) -> Result<usize, Error> {
        self.sinks.push(sink).map_err(|_| Error::Allocation)?;
        Ok(self.sinks.len() - 1)
    }

    /// Remove the sink whose write callback is `write`. Returns whether
    /// one was registered.
    pub fn unregister(&mut self, write: WriteFn) -> bool {
        let before = self.sinks.len();
        self.sinks.retain(|s| s.write != write);
        self.sinks.len() != before
    }

    /// Number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Change one sink's severity threshold.
    pub fn set_level(&mut self, index: usize, level: LogLevel) -> bool {
        match self.sinks.get_mut(index) {
            Some(sink) => {
                sink.level = level;
                true
            }
            None => false,
        }
    }

    /// Activate or deactivate one sink.
    pub fn set_active(&mut self, index: usize, active: bool) -> bool {
        match self.sinks.get_mut(index) {
            Some(sink) => {
                sink.active = active;
                true
            }
            None => false,
        }
    }

    /// Broadcast raw text to every active sink that accepts `level`.
    pub fn write(&self, level: LogLevel, text: &str) {
        self.lock_all();
        for sink in self.sinks.iter().filter(|s| s.active && s.level >= level) {
            (sink.write)(text.as_bytes());
        }
        self.unlock_all();
    }

    /// Format and broadcast one record, CRLF-terminated.
    ///
    /// A record longer than [`MAX_RECORD_LENGTH`] is truncated at the
    /// capacity.
    pub fn log(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        let mut record: String<MAX_RECORD_LENGTH> = String::new();
        let _ = record.write_fmt(args);
        let _ = record.push_str("\r\n");
        self.write(level, &record);
    }

    /// Render a memory region as hex rows and broadcast each row.
    ///
    /// `base` is the address the region claims to start at; it only
    /// affects the printed offsets, `data` supplies the bytes.
    pub fn hex_dump(&self, level: LogLevel, base: usize, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.lock_all();
        let mut row: String<128> = String::new();
        let _ = write!(
            row,
            "memory of 0x{:0width$x}, size: {}:\r\n",
            base,
            data.len(),
            width = ADDR_DIGITS
        );
        self.write_unlocked(level, &row);
        row.clear();
        let _ = write_legend(&mut row);
        self.write_unlocked(level, &row);

        let mut address = base & !0x0F;
        let end = (base + data.len() + 15) & !0x0F;
        while address < end {
            row.clear();
            let _ = write_row(&mut row, address, base, data);
            self.write_unlocked(level, &row);
            address += 16;
        }
        self.unlock_all();
    }

    fn write_unlocked(&self, level: LogLevel, text: &str) {
        for sink in self.sinks.iter().filter(|s| s.active && s.level >= level) {
            (sink.write)(text.as_bytes());
        }
    }

    fn lock_all(&self) {
        for sink in self.sinks.iter().filter(|s| s.active) {
            if let Some(lock) = sink.lock {
                lock();
            }
        }
    }

    fn unlock_all(&self) {
        for sink in self.sinks.iter().filter(|s| s.active) {
            if let Some(unlock) = sink.unlock {
                unlock();
            }
        }
    }
}

impl fmt::Debug for LogBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogBroker")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Render a memory region as hex rows into any writer.
///
/// Layout: a header naming the base and size, an offset legend padded
/// to the pointer width, then rows of 16 bytes starting at `base`
/// aligned down to 16. Bytes outside the region print as three spaces
/// in the hex columns and one space in the ASCII gutter; non-printable
/// bytes show as `.`. Lines end with CRLF.
pub fn hex_dump_to(out: &mut dyn fmt::Write, base: usize, data: &[u8]) -> fmt::Result {
    if data.is_empty() {
        return Ok(());
    }
    write!(
        out,
        "memory of 0x{:0width$x}, size: {}:\r\n",
        base,
        data.len(),
        width = ADDR_DIGITS
    )?;
    write_legend(out)?;
    let mut address = base & !0x0F;
    let end = (base + data.len() + 15) & !0x0F;
    while address < end {
        write_row(out, address, base, data)?;
        address += 16;
    }
    Ok(())
}

fn write_legend(out: &mut dyn fmt::Write) -> fmt::Result {
    // Pad so "Offset:" lines up over the address column below it.
    for _ in 0..(2 + ADDR_DIGITS + 2 - "Offset: ".len()) {
        out.write_char(' ')?;
    }
    out.write_str("Offset: 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F\r\n")
}

fn write_row(out: &mut dyn fmt::Write, address: usize, base: usize, data: &[u8]) -> fmt::Result {
    write!(out, "0x{:0width$x}: ", address, width = ADDR_DIGITS)?;
    for i in 0..16 {
        let pos = address + i;
        if pos < base || pos >= base + data.len() {
            out.write_str("   ")?;
        } else {
            write!(out, "{:02x} ", data[pos - base])?;
        }
    }
    out.write_str("| ")?;
    for i in 0..16 {
        let pos = address + i;
        if pos < base || pos >= base + data.len() {
            out.write_char(' ')?;
        } else {
            let byte = data[pos - base];
            out.write_char(if (0x20..=0x7E).contains(&byte) {
                byte as char
            } else {
                '.'
            })?;
        }
    }
    out.write_str(" |\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_matches_scale() {
        assert!(LogLevel::All > LogLevel::Verbose);
        assert!(LogLevel::Error > LogLevel::None);
        assert!(LogLevel::Info >= LogLevel::Info);
    }

    #[test]
    fn dump_of_empty_region_writes_nothing() {
        let mut out = String::<16>::new();
        hex_dump_to(&mut out, 0x1000, &[]).unwrap();
        assert!(out.is_empty());
    }
}
