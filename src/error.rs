//! Error types for the capture chain.
//!
//! None of these cross the [`AudioSource`](crate::audio::AudioSource)
//! facade: sources log them, count them and keep `is_initialized()` /
//! zeroed output as the only visible outcome.

use thiserror::Error;

use crate::hal::gpio::GpioNum;

/// Error reported by the capture driver binding (ESP-IDF `esp_err_t` on device).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("driver error {code}")]
pub struct DriverError {
    pub code: i32,
}

impl DriverError {
    pub const fn new(code: i32) -> Self {
        Self { code }
    }
}

/// Control-bus (I2C) failure during codec bring-up.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// Device did not acknowledge a register write
    #[error("no ack from 0x{addr:02X} (reg 0x{reg:02X})")]
    Nack { addr: u8, reg: u8 },
    /// SDA or SCL not assigned
    #[error("control bus lines not assigned")]
    Unassigned,
    /// Bus lines owned by something other than the shared bus
    #[error("control bus lines owned elsewhere")]
    Contended,
    /// Bus driver refused the requested SCL frequency
    #[error("control bus clock {hz} Hz rejected")]
    Clock { hz: u32 },
}

/// Why `initialize` left a source uninitialized.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// E01: A requested line is already owned (or does not exist)
    #[error("line {line} not available")]
    LineInUse { line: GpioNum },
    /// E02: Control bus lines missing or not joinable
    #[error("control bus: {0}")]
    Bus(BusError),
    /// E03: Line has no usable analog channel
    #[error("line {line} is not an ADC1 input")]
    NotAnalogLine { line: GpioNum },
    /// E04: Driver install rejected
    #[error("driver install failed: {0}")]
    DriverInstall(DriverError),
    /// E05: Driver pin routing rejected
    #[error("pin config failed: {0}")]
    SetPins(DriverError),
    /// E06: Driver clock setup rejected
    #[error("clock config failed: {0}")]
    SetClock(DriverError),
    /// E07: Driver ADC mode rejected
    #[error("adc mode failed: {0}")]
    AdcMode(DriverError),
    /// E08: No data line given for a source that needs one
    #[error("required line not assigned")]
    MissingLine,
}

impl InitError {
    /// Get error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::LineInUse { .. } => "E01",
            Self::Bus(_) => "E02",
            Self::NotAnalogLine { .. } => "E03",
            Self::DriverInstall(_) => "E04",
            Self::SetPins(_) => "E05",
            Self::SetClock(_) => "E06",
            Self::AdcMode(_) => "E07",
            Self::MissingLine => "E08",
        }
    }
}

impl From<BusError> for InitError {
    fn from(e: BusError) -> Self {
        InitError::Bus(e)
    }
}

/// Per-block capture failure. Recovered locally with a zero block.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureError {
    /// Driver read failed (including timeout)
    #[error("read failed: {0}")]
    Read(DriverError),
    /// Driver delivered fewer bytes than requested
    #[error("short read: wanted {wanted} bytes, got {got}")]
    ShortRead { wanted: usize, got: usize },
    /// Per-block ADC enable failed
    #[error("adc enable failed: {0}")]
    AdcEnable(DriverError),
}
