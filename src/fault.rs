//! Capture diagnostics.
//!
//! A source never reports failures through `get_samples()`: a failed
//! block is silence. What went wrong is kept here instead, in plain
//! atomics that a console or web task can read from any core while the
//! capture task keeps running.

use core::sync::atomic::{AtomicU32, Ordering};

/// Per-source capture counters.
///
/// # Usage
///
/// ```ignore
/// // In the capture task:
/// if got != wanted {
///     stats.record_short_read();
/// }
///
/// // Elsewhere:
/// let snap = source.stats().snapshot();
/// if snap.short_reads > 0 { /* show warning */ }
/// ```
pub struct CaptureStats {
    /// Failed `initialize()` calls.
    init_failures: AtomicU32,

    /// Driver reads that returned an error (timeouts included).
    read_errors: AtomicU32,

    /// Driver reads that returned fewer bytes than requested.
    short_reads: AtomicU32,

    /// Blocks handed to the caller with real data.
    blocks: AtomicU32,

    /// Analog samples replaced because of a channel mismatch.
    rejected_samples: AtomicU32,

    /// Times the analog corrector gave up on channel checks.
    correction_disabled: AtomicU32,
}

impl CaptureStats {
    /// Create zeroed counters.
    pub const fn new() -> Self {
        Self {
            init_failures: AtomicU32::new(0),
            read_errors: AtomicU32::new(0),
            short_reads: AtomicU32::new(0),
            blocks: AtomicU32::new(0),
            rejected_samples: AtomicU32::new(0),
            correction_disabled: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn record_init_failure(&self) {
        self.init_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_short_read(&self) {
        self.short_reads.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_block(&self) {
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    /// Add `n` rejected samples (one block's worth at most).
    #[inline]
    pub fn record_rejected(&self, n: u32) {
        if n > 0 {
            self.rejected_samples.fetch_add(n, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_correction_disabled(&self) {
        self.correction_disabled.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn blocks(&self) -> u32 {
        self.blocks.load(Ordering::Relaxed)
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.init_failures.store(0, Ordering::Relaxed);
        self.read_errors.store(0, Ordering::Relaxed);
        self.short_reads.store(0, Ordering::Relaxed);
        self.blocks.store(0, Ordering::Relaxed);
        self.rejected_samples.store(0, Ordering::Relaxed);
        self.correction_disabled.store(0, Ordering::Relaxed);
    }

    /// Get a snapshot of the counters.
    #[inline]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            init_failures: self.init_failures.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            short_reads: self.short_reads.load(Ordering::Relaxed),
            blocks: self.blocks.load(Ordering::Relaxed),
            rejected_samples: self.rejected_samples.load(Ordering::Relaxed),
            correction_disabled: self.correction_disabled.load(Ordering::Relaxed),
        }
    }
}

impl Default for CaptureStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of capture counters at a point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub init_failures: u32,
    pub read_errors: u32,
    pub short_reads: u32,
    pub blocks: u32,
    pub rejected_samples: u32,
    pub correction_disabled: u32,
}

impl StatsSnapshot {
    /// Blocks that came back as silence.
    pub fn failed_blocks(&self) -> u32 {
        self.read_errors.saturating_add(self.short_reads)
    }
}
