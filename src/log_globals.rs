//! Process-wide log rings.
//!
//! The capture task runs pinned to core 0 and gets a ring to itself, so a
//! burst of bring-up or settings messages on core 1 never pushes capture
//! diagnostics out.

use crate::logging::LogStream;

/// Records from core 0 (capture task).
pub static CAPTURE_LOG_STREAM: LogStream = LogStream::new();

/// Records from every other context. Host builds log everything here.
pub static BG_LOG_STREAM: LogStream = LogStream::new();
