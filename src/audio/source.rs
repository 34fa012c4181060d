//! Audio source facade.
//!
//! Downstream analysis code only ever talks to this trait. Every failure
//! stays behind it: an `initialize` that did not work leaves
//! `is_initialized()` false, a block that could not be captured comes back
//! as silence.

use crate::config::CapturePins;

/// Capture mechanism behind a source. Fixed per variant.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSourceType {
    /// Digital bus capture (I2S / PDM microphone or codec)
    I2sDigital = 0,
    /// Built-in ADC sampled through the shared I2S peripheral
    I2sAdc = 1,
}

impl AudioSourceType {
    /// Convert from u8 (`None` for unknown tags)
    #[inline]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::I2sDigital),
            1 => Some(Self::I2sAdc),
            _ => None,
        }
    }
}

impl From<AudioSourceType> for u8 {
    fn from(t: AudioSourceType) -> Self {
        t as u8
    }
}

/// One physical capture chain.
///
/// Not reentrant: drive it from a single task.
pub trait AudioSource {
    /// Claim lines and start capture. Silently stays uninitialized on
    /// any failure, with every partial claim undone.
    fn initialize(&mut self, pins: CapturePins);

    /// Stop capture and release what `initialize` claimed. Safe to call at
    /// any time, any number of times.
    fn deinitialize(&mut self);

    /// Fill `buffer` with normalized samples.
    ///
    /// The whole slice is zeroed first. At most
    /// [`I2S_SAMPLES_MAX`](crate::config::I2S_SAMPLES_MAX) entries are
    /// filled; the return value is the number of samples delivered
    /// (0 when uninitialized or when the block could not be captured).
    fn get_samples(&mut self, buffer: &mut [f32]) -> usize;

    fn is_initialized(&self) -> bool;

    fn source_type(&self) -> AudioSourceType;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_from_u8() {
        assert_eq!(AudioSourceType::from_u8(0), Some(AudioSourceType::I2sDigital));
        assert_eq!(AudioSourceType::from_u8(1), Some(AudioSourceType::I2sAdc));
        assert_eq!(AudioSourceType::from_u8(9), None);
        assert_eq!(u8::from(AudioSourceType::I2sAdc), 1);
    }
}
