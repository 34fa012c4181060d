//! Tagged dispatch over the concrete sources.
//!
//! The variant is picked once from [`InputSettings`] and never changes;
//! callers hold an `AudioInput` and use it through [`AudioSource`].

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::audio::adc_source::AdcSource;
use crate::audio::codec_source::{CodecSource, ControlBus};
use crate::audio::i2s_source::I2sSource;
use crate::audio::source::{AudioSource, AudioSourceType};
use crate::config::{CapturePins, InputKind, InputSettings};
use crate::error::InitError;
use crate::fault::CaptureStats;
use crate::hal::codec::{BringUpState, BusClock, CodecModel};
use crate::hal::gpio::LineAllocator;
use crate::hal::i2s::AdcCaptureDriver;

/// Any supported audio input.
pub enum AudioInput<'a, D, L, I, T>
where
    D: AdcCaptureDriver,
    L: LineAllocator + ?Sized,
{
    /// Plain I2S / PDM microphone (SPH0645 included)
    I2s(I2sSource<'a, D, L>),
    /// I2S behind a control-bus codec
    Codec(CodecSource<'a, D, L, I, T>),
    /// Analog microphone on the built-in ADC
    Adc(AdcSource<'a, D, L>),
}

impl<'a, D, L, I, T> AudioInput<'a, D, L, I, T>
where
    D: AdcCaptureDriver,
    L: LineAllocator + ?Sized,
    I: I2c + BusClock,
    T: DelayNs,
{
    /// Build the variant selected by `settings.kind`.
    ///
    /// `bus` is only kept by codec variants.
    pub fn from_settings(
        settings: &InputSettings,
        driver: D,
        lines: &'a L,
        bus: ControlBus<I, T>,
    ) -> Self {
        let config = settings.device_config();
        match settings.kind {
            InputKind::Generic => Self::I2s(I2sSource::new(driver, lines, config)),
            InputKind::Sph0645 => Self::I2s(I2sSource::sph0645(driver, lines, config)),
            InputKind::Adc => Self::Adc(AdcSource::new(driver, lines, config)),
            InputKind::Es7243
            | InputKind::Es8388
            | InputKind::Es8311
            | InputKind::Wm8978
            | InputKind::Ac101 => match CodecModel::from_kind(settings.kind) {
                Some(model) => Self::Codec(CodecSource::new(model, driver, lines, config, bus)),
                None => Self::I2s(I2sSource::new(driver, lines, config)),
            },
        }
    }

    pub fn stats(&self) -> &CaptureStats {
        match self {
            Self::I2s(s) => s.stats(),
            Self::Codec(s) => s.stats(),
            Self::Adc(s) => s.stats(),
        }
    }

    pub fn last_init_error(&self) -> Option<InitError> {
        match self {
            Self::I2s(s) => s.last_init_error(),
            Self::Codec(s) => s.last_init_error(),
            Self::Adc(s) => s.last_init_error(),
        }
    }

    /// Bring-up progress for codec inputs.
    pub fn bring_up_state(&self) -> Option<BringUpState> {
        match self {
            Self::Codec(s) => Some(s.state()),
            Self::I2s(_) | Self::Adc(_) => None,
        }
    }
}

impl<'a, D, L, I, T> AudioSource for AudioInput<'a, D, L, I, T>
where
    D: AdcCaptureDriver,
    L: LineAllocator + ?Sized,
    I: I2c + BusClock,
    T: DelayNs,
{
    fn initialize(&mut self, pins: CapturePins) {
        match self {
            Self::I2s(s) => s.initialize(pins),
            Self::Codec(s) => s.initialize(pins),
            Self::Adc(s) => s.initialize(pins),
        }
    }

    fn deinitialize(&mut self) {
        match self {
            Self::I2s(s) => s.deinitialize(),
            Self::Codec(s) => s.deinitialize(),
            Self::Adc(s) => s.deinitialize(),
        }
    }

    fn get_samples(&mut self, buffer: &mut [f32]) -> usize {
        match self {
            Self::I2s(s) => s.get_samples(buffer),
            Self::Codec(s) => s.get_samples(buffer),
            Self::Adc(s) => s.get_samples(buffer),
        }
    }

    fn is_initialized(&self) -> bool {
        match self {
            Self::I2s(s) => s.is_initialized(),
            Self::Codec(s) => s.is_initialized(),
            Self::Adc(s) => s.is_initialized(),
        }
    }

    fn source_type(&self) -> AudioSourceType {
        match self {
            Self::I2s(s) => s.source_type(),
            Self::Codec(s) => s.source_type(),
            Self::Adc(s) => s.source_type(),
        }
    }
}
