//! Non-blocking logging for the capture chain.
//!
//! ```text
//! capture task ──ar_warn!()──▶ LogStream (slot ring) ──drain()──▶ uart_logger ──▶ UART
//!  never blocks               fixed records, no heap              low priority
//! ```
//!
//! - `get_samples()` only logs through the `ar_*!` macros
//! - A full ring drops the new record and counts it
//! - Records above the global max level are never formatted

use core::cell::UnsafeCell;
use core::fmt;
use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Longest message kept per record.
pub const MAX_MSG_LEN: usize = 120;

/// Records per stream.
pub const LOG_BUFFER_SIZE: usize = 256;

/// Log level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    /// Convert from u8 (values past `Trace` saturate to `Trace`).
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// One log record.
#[derive(Clone, Copy)]
pub struct LogEntry {
    /// Microseconds since boot (0 on host)
    pub timestamp_us: i64,
    pub level: LogLevel,
    /// Used bytes of `msg`
    pub len: u8,
    pub msg: [u8; MAX_MSG_LEN],
}

impl LogEntry {
    const BLANK: Self = Self {
        timestamp_us: 0,
        level: LogLevel::Info,
        len: 0,
        msg: [0; MAX_MSG_LEN],
    };

    /// Record holding `text`, cut at [`MAX_MSG_LEN`].
    pub fn new(timestamp_us: i64, level: LogLevel, text: &[u8]) -> Self {
        let len = text.len().min(MAX_MSG_LEN);
        let mut entry = Self {
            timestamp_us,
            level,
            len: len as u8,
            ..Self::BLANK
        };
        entry.msg[..len].copy_from_slice(&text[..len]);
        entry
    }

    pub fn text(&self) -> &[u8] {
        &self.msg[..self.len as usize]
    }
}

impl Default for LogEntry {
    fn default() -> Self {
        Self::BLANK
    }
}

impl fmt::Debug for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEntry")
            .field("timestamp_us", &self.timestamp_us)
            .field("level", &self.level)
            .field("text", &core::str::from_utf8(self.text()).unwrap_or("<bytes>"))
            .finish()
    }
}

/// Ring slot. `seq` tells producers and the consumer whose turn it is.
struct Slot {
    /// `lap * N` when free for the producer of that lap,
    /// `lap * N + 1` once written and waiting for the consumer
    seq: AtomicU32,
    entry: UnsafeCell<LogEntry>,
}

/// Bounded lock-free log ring: any number of producers, one consumer.
///
/// A producer reserves a slot by advancing `head`, writes the record and
/// then publishes it through the slot sequence. The consumer only reads
/// slots that were published, so a half-written record is never drained.
pub struct LogStream<const N: usize = LOG_BUFFER_SIZE> {
    slots: [Slot; N],
    head: AtomicU32,
    tail: AtomicU32,
    dropped: AtomicU32,
}

// SAFETY: a slot's entry is written only by the producer that reserved it
// and read only by the consumer after the Release store on `seq`.
unsafe impl<const N: usize> Sync for LogStream<N> {}

impl<const N: usize> LogStream<N> {
    const MASK: u32 = (N as u32).wrapping_sub(1);

    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "log ring size must be a power of 2");
        const FREE: Slot = Slot {
            seq: AtomicU32::new(0),
            entry: UnsafeCell::new(LogEntry::BLANK),
        };
        Self {
            slots: [FREE; N],
            head: AtomicU32::new(0),
            tail: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Queue a record. Returns `false` (and counts a drop) when full.
    pub fn push(&self, timestamp_us: i64, level: LogLevel, msg: &[u8]) -> bool {
        let mut pos = self.head.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[(pos & Self::MASK) as usize];
            let lap_base = pos & !Self::MASK;
            let seq = slot.seq.load(Ordering::Acquire);
            let diff = seq.wrapping_sub(lap_base) as i32;

            if diff == 0 {
                match self.head.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: slot reserved by the successful CAS above
                        unsafe { *slot.entry.get() = LogEntry::new(timestamp_us, level, msg) };
                        slot.seq.store(lap_base.wrapping_add(1), Ordering::Release);
                        return true;
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                // Previous lap still waiting for the consumer
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            } else {
                pos = self.head.load(Ordering::Relaxed);
            }
        }
    }

    /// Take the oldest published record. Single consumer only.
    pub fn drain(&self) -> Option<LogEntry> {
        let pos = self.tail.load(Ordering::Relaxed);
        let slot = &self.slots[(pos & Self::MASK) as usize];
        let lap_base = pos & !Self::MASK;

        if slot.seq.load(Ordering::Acquire) != lap_base.wrapping_add(1) {
            return None;
        }
        // SAFETY: published by a producer, not reused until seq moves on
        let entry = unsafe { *slot.entry.get() };
        slot.seq
            .store(lap_base.wrapping_add(N as u32), Ordering::Release);
        self.tail.store(pos.wrapping_add(1), Ordering::Relaxed);
        Some(entry)
    }

    /// Records dropped since the last `reset_dropped`.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn reset_dropped(&self) {
        self.dropped.store(0, Ordering::Relaxed);
    }

    /// Records reserved but not yet drained (may include one being written).
    pub fn pending(&self) -> u32 {
        self.head
            .load(Ordering::Acquire)
            .wrapping_sub(self.tail.load(Ordering::Relaxed))
    }

    pub fn has_entries(&self) -> bool {
        self.pending() != 0
    }
}

impl<const N: usize> Default for LogStream<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Stack buffer for one formatted message. Output past the end is cut.
pub struct MsgBuf<const CAP: usize = MAX_MSG_LEN> {
    buf: [u8; CAP],
    len: usize,
}

impl<const CAP: usize> MsgBuf<CAP> {
    pub const fn new() -> Self {
        Self {
            buf: [0; CAP],
            len: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }
}

impl<const CAP: usize> Default for MsgBuf<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAP: usize> fmt::Write for MsgBuf<CAP> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let n = s.len().min(CAP - self.len);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

static MAX_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Set the most verbose level that still gets logged.
pub fn set_max_level(level: LogLevel) {
    MAX_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub fn max_level() -> LogLevel {
    LogLevel::from_u8(MAX_LEVEL.load(Ordering::Relaxed))
}

#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level as u8 <= MAX_LEVEL.load(Ordering::Relaxed)
}

/// Log at an explicit level.
///
/// ```ignore
/// ar_log!(LogLevel::Info, "I2S driver installed, {} bits", bits);
/// ```
#[macro_export]
macro_rules! ar_log {
    ($level:expr, $($arg:tt)*) => {{
        let level: $crate::logging::LogLevel = $level;
        if $crate::logging::level_enabled(level) {
            let mut msg = $crate::logging::MsgBuf::<{ $crate::logging::MAX_MSG_LEN }>::new();
            let _ = ::core::fmt::Write::write_fmt(&mut msg, format_args!($($arg)*));
            $crate::logging::current_log_stream().push(
                $crate::logging::timestamp_us(),
                level,
                msg.as_bytes(),
            );
        }
    }};
}

#[macro_export]
macro_rules! ar_error {
    ($($arg:tt)*) => {
        $crate::ar_log!($crate::logging::LogLevel::Error, $($arg)*)
    };
}

#[macro_export]
macro_rules! ar_warn {
    ($($arg:tt)*) => {
        $crate::ar_log!($crate::logging::LogLevel::Warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! ar_info {
    ($($arg:tt)*) => {
        $crate::ar_log!($crate::logging::LogLevel::Info, $($arg)*)
    };
}

#[macro_export]
macro_rules! ar_debug {
    ($($arg:tt)*) => {
        $crate::ar_log!($crate::logging::LogLevel::Debug, $($arg)*)
    };
}

#[macro_export]
macro_rules! ar_trace {
    ($($arg:tt)*) => {
        $crate::ar_log!($crate::logging::LogLevel::Trace, $($arg)*)
    };
}

/// Microseconds since boot.
#[cfg(target_os = "espidf")]
#[inline]
pub fn timestamp_us() -> i64 {
    // SAFETY: plain read of the high-resolution timer
    unsafe { esp_idf_svc::sys::esp_timer_get_time() }
}

#[cfg(not(target_os = "espidf"))]
#[inline]
pub fn timestamp_us() -> i64 {
    0
}

/// Stream for the calling core: capture core 0 gets its own ring.
#[cfg(target_os = "espidf")]
#[inline]
pub fn current_log_stream() -> &'static LogStream {
    // SAFETY: querying the running task's core has no preconditions
    let core = unsafe {
        esp_idf_svc::sys::xTaskGetCoreID(esp_idf_svc::sys::xTaskGetCurrentTaskHandle())
    };
    if core == 0 {
        &crate::log_globals::CAPTURE_LOG_STREAM
    } else {
        &crate::log_globals::BG_LOG_STREAM
    }
}

#[cfg(not(target_os = "espidf"))]
#[inline]
pub fn current_log_stream() -> &'static LogStream {
    &crate::log_globals::BG_LOG_STREAM
}
