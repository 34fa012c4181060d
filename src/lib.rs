//! # audioreactive-input
//!
//! Audio input layer for an audio-reactive LED controller.
//!
//! ## Architecture
//!
//! ```text
//! InputSettings ─▶ AudioInput ─┬─ I2sSource    (I2S / PDM / SPH0645)
//!                              ├─ CodecSource  (ES7243, ES8388, ES8311, WM8978, AC101)
//!                              └─ AdcSource    (analog mic on ADC1)
//!                                     │
//!                      CaptureDriver ─▶ AcquisitionPipeline ─▶ &mut [f32]
//! ```
//!
//! - One periodic task calls [`AudioSource::get_samples`]; it is the only
//!   blocking call in the crate
//! - Failures never cross the facade: they end up in the log streams,
//!   the [`CaptureStats`] counters and zeroed blocks
//! - Physical lines are owned through a [`LineAllocator`] and always
//!   given back on `deinitialize`

#![cfg_attr(not(test), no_std)]

pub mod logging;
pub mod log_globals;

pub mod config;
pub mod error;
pub mod fault;
pub mod sample;

pub mod audio;
pub mod hal;

pub mod uart_logger;

pub use audio::{AudioInput, AudioSource, AudioSourceType};
pub use config::{CapturePins, DeviceConfig, InputKind, InputSettings, I2S_SAMPLES_MAX};
pub use error::{BusError, CaptureError, DriverError, InitError};
pub use fault::{CaptureStats, StatsSnapshot};
pub use hal::gpio::{LineAllocator, PinManager, PinOwner};
pub use log_globals::{BG_LOG_STREAM, CAPTURE_LOG_STREAM};
pub use sample::{I2sWord, RawSample};
