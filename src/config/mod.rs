//! Module: config
//!
//! Purpose: Static description of one capture chain.
//!
//! Architecture:
//! - `DeviceConfig`: sample rate, block size, scale, I2S role, channel slot.
//!   Built once per source, never mutated afterwards.
//! - `InputSettings`: which source variant to build and on which lines.
//!   Persisted in NVS on device (see [`nvs`]).
//!
//! Safety: Safe. Plain data.

use core::time::Duration;

use crate::hal::codec::CodecModel;
use crate::hal::gpio::GpioNum;

pub mod nvs;

/// Max number of samples for a single driver read (size of the staging buffer).
pub const I2S_SAMPLES_MAX: usize = 512;

/// Default sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// Default bounded wait for one block.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// I2S slot(s) captured from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFormat {
    /// Mono, left slot
    OnlyLeft,
    /// Mono, right slot
    OnlyRight,
}

impl ChannelFormat {
    /// Slot used by plain I2S microphones for this build.
    pub const fn mic_default() -> Self {
        if cfg!(feature = "right-channel") {
            Self::OnlyRight
        } else {
            Self::OnlyLeft
        }
    }
}

/// Capture chain configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Samples per DMA buffer / per typical `get_samples` call
    pub block_size: usize,
    /// Factor applied to every normalized sample
    pub sample_scale: f32,
    /// `false` puts the I2S peripheral in slave mode (experimental)
    pub i2s_master: bool,
    /// Slot captured from the bus
    pub channel_format: ChannelFormat,
    /// Max wait for one block, `None` waits forever
    pub read_timeout: Option<Duration>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: I2S_SAMPLES_MAX,
            sample_scale: 1.0,
            i2s_master: true,
            channel_format: ChannelFormat::mic_default(),
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
        }
    }
}

impl DeviceConfig {
    /// Config with the given rate and block size, defaults otherwise.
    pub fn new(sample_rate: u32, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, sample_scale: f32) -> Self {
        self.sample_scale = sample_scale;
        self
    }

    pub fn with_master(mut self, i2s_master: bool) -> Self {
        self.i2s_master = i2s_master;
        self
    }

    pub fn with_channel(mut self, channel_format: ChannelFormat) -> Self {
        self.channel_format = channel_format;
        self
    }

    pub fn with_timeout(mut self, read_timeout: Option<Duration>) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

/// Microphone / front-end model.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Standard I2S or PDM microphone (INMP441, ICS-43434, ...)
    Generic = 1,
    /// SPH0645 with its RX timing quirk
    Sph0645 = 2,
    /// ES7243 ADC behind I2C
    Es7243 = 3,
    /// ES8388 codec behind I2C (line-in)
    Es8388 = 4,
    /// ES8311 codec behind I2C
    Es8311 = 5,
    /// WM8978 codec behind I2C
    Wm8978 = 6,
    /// AC101 codec behind I2C
    Ac101 = 7,
    /// Analog microphone on an ADC1 pad, sampled through I2S
    Adc = 8,
}

impl InputKind {
    /// Convert from u8 (`None` for unknown values)
    pub fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => Self::Generic,
            2 => Self::Sph0645,
            3 => Self::Es7243,
            4 => Self::Es8388,
            5 => Self::Es8311,
            6 => Self::Wm8978,
            7 => Self::Ac101,
            8 => Self::Adc,
            _ => return None,
        })
    }

    /// True for front-ends that need a control bus bring-up.
    pub fn needs_control_bus(self) -> bool {
        matches!(
            self,
            Self::Es7243 | Self::Es8388 | Self::Es8311 | Self::Wm8978 | Self::Ac101
        )
    }
}

/// Lines for one capture chain.
///
/// For the analog source only `sd` is used (the ADC pad).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapturePins {
    /// Word select (LRCLK); PDM clock for PDM microphones
    pub ws: Option<GpioNum>,
    /// Serial data in; analog pad for the ADC source
    pub sd: Option<GpioNum>,
    /// Bit clock; `None` selects PDM mode
    pub sck: Option<GpioNum>,
    /// Master clock output
    pub mclk: Option<GpioNum>,
}

impl CapturePins {
    /// Standard I2S microphone wiring.
    pub const fn i2s(ws: GpioNum, sd: GpioNum, sck: GpioNum) -> Self {
        Self {
            ws: Some(ws),
            sd: Some(sd),
            sck: Some(sck),
            mclk: None,
        }
    }

    /// PDM microphone wiring (no bit clock).
    pub const fn pdm(clk: GpioNum, data: GpioNum) -> Self {
        Self {
            ws: Some(clk),
            sd: Some(data),
            sck: None,
            mclk: None,
        }
    }

    /// Analog microphone pad.
    pub const fn analog(pad: GpioNum) -> Self {
        Self {
            ws: None,
            sd: Some(pad),
            sck: None,
            mclk: None,
        }
    }

    pub const fn with_mclk(mut self, mclk: GpioNum) -> Self {
        self.mclk = Some(mclk);
        self
    }
}

/// User-facing audio input settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSettings {
    pub kind: InputKind,
    pub pins: CapturePins,
    /// I2C data line for codec bring-up
    pub sda: Option<GpioNum>,
    /// I2C clock line for codec bring-up
    pub scl: Option<GpioNum>,
    pub sample_scale: f32,
    pub sample_rate: u32,
    pub i2s_master: bool,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            kind: InputKind::Generic,
            pins: CapturePins::default(),
            sda: None,
            scl: None,
            sample_scale: 1.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            i2s_master: true,
        }
    }
}

impl InputSettings {
    /// Device configuration for these settings.
    ///
    /// The channel slot is fixed by the front-end model.
    pub fn device_config(&self) -> DeviceConfig {
        let channel = match CodecModel::from_kind(self.kind) {
            Some(model) => model.channel_format(),
            None if self.kind == InputKind::Adc => ChannelFormat::OnlyLeft,
            None => ChannelFormat::mic_default(),
        };
        DeviceConfig::new(self.sample_rate, I2S_SAMPLES_MAX)
            .with_scale(self.sample_scale)
            .with_master(self.i2s_master || self.kind == InputKind::Adc)
            .with_channel(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = DeviceConfig::default();
        assert_eq!(cfg.sample_rate, 22050);
        assert_eq!(cfg.block_size, 512);
        assert_eq!(cfg.sample_scale, 1.0);
        assert!(cfg.i2s_master);
        assert_eq!(cfg.read_timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_kind_roundtrip_and_unknown() {
        for v in 1..=8u8 {
            assert_eq!(InputKind::from_u8(v).map(|k| k as u8), Some(v));
        }
        assert_eq!(InputKind::from_u8(0), None);
        assert_eq!(InputKind::from_u8(42), None);
    }

    #[test]
    fn test_codec_channel_slots() {
        let mut s = InputSettings {
            kind: InputKind::Es7243,
            ..Default::default()
        };
        assert_eq!(s.device_config().channel_format, ChannelFormat::OnlyRight);

        s.kind = InputKind::Es8311;
        assert_eq!(s.device_config().channel_format, ChannelFormat::OnlyLeft);
    }

    #[test]
    fn test_adc_forces_master() {
        let s = InputSettings {
            kind: InputKind::Adc,
            i2s_master: false,
            ..Default::default()
        };
        assert!(s.device_config().i2s_master);
    }
}
