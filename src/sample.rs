//! Module: sample
//!
//! Purpose: Raw I2S sample words as delivered by the capture driver, and their
//! conversion to normalized floating point.
//!
//! Architecture:
//! - One word width per build (`I2sWord`), selected with the `narrow-samples`
//!   feature. The pipeline and the ADC corrector are generic over
//!   [`RawSample`] so both encodings stay testable on the host.
//! - 32-bit words are reduced to the 16-bit working range: the high 16 bits
//!   become the integer part, the low 16 bits the fraction.
//! - ADC-over-I2S words carry a 4-bit channel tag above a 12-bit unsigned
//!   magnitude inside the 16-bit field returned by [`RawSample::adc_field`].
//!
//! Safety: Safe. No unsafe blocks. Copy types only.

/// A fixed-width signed word produced by the capture driver.
pub trait RawSample: Copy + Default + PartialEq + core::fmt::Debug + Send + 'static {
    /// Word width in bits (16 or 32).
    const BITS: u32;

    /// All-zero word, used to initialize staging buffers.
    const ZERO: Self;

    /// Size of one word in bytes, as counted by the driver.
    const BYTES: usize = (Self::BITS / 8) as usize;

    /// Convert to the normalized 16-bit working range.
    fn to_normalized(self) -> f32;

    /// The 16-bit field holding `[tag:4][magnitude:12]` for ADC captures.
    fn adc_field(self) -> u16;

    /// Scale a 16-bit-domain value up to this word's domain.
    fn widen_from_16(value: i32) -> i32;

    /// Scale a filter state value (word domain, after the 12->10 bit step)
    /// down to the signed 12-bit ADC domain.
    fn state_to_12bit(state: i32) -> i32;

    /// Build a word from a value already in this word's domain.
    fn from_i32(value: i32) -> Self;

    /// Widen this word to `i32` without rescaling.
    fn to_i32(self) -> i32;
}

impl RawSample for i32 {
    const BITS: u32 = 32;
    const ZERO: Self = 0;

    /// 32 bit -> 16 bit, keeping the lower 16 bits as decimal places.
    #[inline]
    fn to_normalized(self) -> f32 {
        self as f32 / 65536.0
    }

    #[inline]
    fn adc_field(self) -> u16 {
        ((self as u32 >> 16) & 0xFFFF) as u16
    }

    #[inline]
    fn widen_from_16(value: i32) -> i32 {
        value << 16
    }

    /// 26 bit -> 12 bit, sign preserved (truncates toward zero).
    #[inline]
    fn state_to_12bit(state: i32) -> i32 {
        state / 16384
    }

    #[inline]
    fn from_i32(value: i32) -> Self {
        value
    }

    #[inline]
    fn to_i32(self) -> i32 {
        self
    }
}

impl RawSample for i16 {
    const BITS: u32 = 16;
    const ZERO: Self = 0;

    #[inline]
    fn to_normalized(self) -> f32 {
        self as f32
    }

    #[inline]
    fn adc_field(self) -> u16 {
        self as u16
    }

    #[inline]
    fn widen_from_16(value: i32) -> i32 {
        value
    }

    /// 10 bit -> 12 bit.
    #[inline]
    fn state_to_12bit(state: i32) -> i32 {
        state * 4
    }

    #[inline]
    fn from_i32(value: i32) -> Self {
        value as i16
    }

    #[inline]
    fn to_i32(self) -> i32 {
        self as i32
    }
}

/// Word type requested from the I2S driver for this build.
#[cfg(not(feature = "narrow-samples"))]
pub type I2sWord = i32;

/// Word type requested from the I2S driver for this build.
#[cfg(feature = "narrow-samples")]
pub type I2sWord = i16;

/// Decoded ADC-over-I2S word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdcWord {
    /// Channel tag (upper 4 bits of the ADC field).
    pub channel: u8,
    /// Signed magnitude, centered at 0 (-2048..=2047).
    pub magnitude: i32,
}

impl AdcWord {
    /// Decode the channel tag and signed magnitude of a raw word.
    #[inline]
    pub fn decode<W: RawSample>(word: W) -> Self {
        let field = word.adc_field();
        Self {
            channel: ((field >> 12) & 0x000F) as u8,
            magnitude: (field & 0x0FFF) as i32 - 2048,
        }
    }

    /// Encode a channel tag and unsigned 12-bit reading into a raw word.
    ///
    /// Inverse of [`AdcWord::decode`]; mostly useful to simulate ADC captures.
    pub fn encode<W: RawSample>(channel: u8, reading: u16) -> W {
        let field = (((channel as u16) & 0x0F) << 12) | (reading & 0x0FFF);
        W::from_i32(W::widen_from_16(field as i16 as i32))
    }
}
