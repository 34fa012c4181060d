//! Hardware abstraction layer for the audio input chain.
//!
//! Thin seams around ESP-IDF peripherals so the capture logic above them
//! runs unchanged on the host against fakes.

pub mod codec;
pub mod gpio;
pub mod i2s;

pub use codec::{BringUpReport, BringUpState, BusClock, CodecModel};
pub use gpio::{ClaimedLines, GpioNum, LineAllocator, LineError, PinManager, PinOwner};
pub use i2s::{AdcCaptureDriver, CaptureDriver, ChannelMode, DriverConfig, I2sRole, PinConfig, RxMode};
