//! Block acquisition pipeline.
//!
//! ```text
//! CaptureDriver ──read──▶ staging [W; 516] ──process──▶ normalize ──× scale──▶ &mut [f32]
//!                          (owned, reused)   (strategy)
//! ```
//!
//! One call = one block. Output index `i` is always the `i`-th word the
//! driver delivered for that call. A block is either fully converted or
//! left as zeros: nothing stale ever reaches the caller.

use core::time::Duration;

use crate::config::{DeviceConfig, I2S_SAMPLES_MAX};
use crate::error::CaptureError;
use crate::fault::CaptureStats;
use crate::hal::i2s::CaptureDriver;
use crate::sample::RawSample;

/// Staging capacity (a few spare words past the largest block).
pub const STAGING_LEN: usize = I2S_SAMPLES_MAX + 4;

/// Per-word post-processing applied before normalization.
pub trait SampleProcessor<W: RawSample> {
    fn process(&mut self, word: W) -> W;
}

/// Identity post-processing for digital bus sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl<W: RawSample> SampleProcessor<W> for Passthrough {
    #[inline]
    fn process(&mut self, word: W) -> W {
        word
    }
}

/// Owns the staging buffer and the per-block conversion.
pub struct AcquisitionPipeline<W: RawSample> {
    staging: [W; STAGING_LEN],
    sample_scale: f32,
    read_timeout: Option<Duration>,
}

impl<W: RawSample> AcquisitionPipeline<W> {
    pub fn new(config: &DeviceConfig) -> Self {
        Self {
            staging: [W::ZERO; STAGING_LEN],
            sample_scale: config.sample_scale,
            read_timeout: config.read_timeout,
        }
    }

    pub fn sample_scale(&self) -> f32 {
        self.sample_scale
    }

    /// Capture one block into `out`.
    ///
    /// `out` is zeroed up front, then `min(out.len(), I2S_SAMPLES_MAX)`
    /// words are requested. On error `out` stays all zeros.
    pub fn acquire<D, P>(
        &mut self,
        driver: &mut D,
        processor: &mut P,
        out: &mut [f32],
    ) -> Result<usize, CaptureError>
    where
        D: CaptureDriver<Word = W> + ?Sized,
        P: SampleProcessor<W> + ?Sized,
    {
        out.fill(0.0);
        let count = out.len().min(I2S_SAMPLES_MAX);
        if count == 0 {
            return Ok(0);
        }

        let words = &mut self.staging[..count];
        let wanted = count * W::BYTES;
        let got = driver
            .read(words, self.read_timeout)
            .map_err(CaptureError::Read)?;
        if got != wanted {
            return Err(CaptureError::ShortRead { wanted, got });
        }

        for (slot, word) in out.iter_mut().zip(words.iter_mut()) {
            *word = processor.process(*word);
            *slot = word.to_normalized() * self.sample_scale;
        }
        Ok(count)
    }
}

/// Count and log a failed block. The caller already holds a zero block.
pub(crate) fn record_capture_error(stats: &CaptureStats, err: CaptureError) {
    match err {
        CaptureError::ShortRead { .. } => stats.record_short_read(),
        CaptureError::Read(_) | CaptureError::AdcEnable(_) => stats.record_read_error(),
    }
    crate::ar_debug!("capture: {}", err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;
    use crate::hal::i2s::{ChannelMode, DriverConfig, PinConfig};

    /// Driver that fills every read with one value.
    struct Constant<W> {
        value: W,
        short_by: usize,
    }

    impl<W: RawSample> CaptureDriver for Constant<W> {
        type Word = W;

        fn install(&mut self, _: &DriverConfig) -> Result<(), DriverError> {
            Ok(())
        }
        fn set_pins(&mut self, _: &PinConfig) -> Result<(), DriverError> {
            Ok(())
        }
        fn set_clock(&mut self, _: u32, _: u32, _: ChannelMode) -> Result<(), DriverError> {
            Ok(())
        }
        fn read(&mut self, words: &mut [W], _: Option<Duration>) -> Result<usize, DriverError> {
            words.fill(self.value);
            Ok(words.len() * W::BYTES - self.short_by)
        }
        fn uninstall(&mut self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    #[test]
    fn test_mid_scale_wide_words() {
        let mut pipe = AcquisitionPipeline::<i32>::new(&DeviceConfig::new(22050, 64));
        let mut drv = Constant { value: 32768i32, short_by: 0 };
        let mut out = [9.0f32; 64];

        let n = pipe.acquire(&mut drv, &mut Passthrough, &mut out).unwrap();
        assert_eq!(n, 64);
        assert!(out.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_scale_applied() {
        let cfg = DeviceConfig::default().with_scale(2.0);
        let mut pipe = AcquisitionPipeline::<i16>::new(&cfg);
        let mut drv = Constant { value: -3i16, short_by: 0 };
        let mut out = [0.0f32; 8];

        pipe.acquire(&mut drv, &mut Passthrough, &mut out).unwrap();
        assert!(out.iter().all(|&s| s == -6.0));
    }

    #[test]
    fn test_short_read_leaves_zeros() {
        let mut pipe = AcquisitionPipeline::<i32>::new(&DeviceConfig::default());
        let mut drv = Constant { value: 1i32 << 16, short_by: 4 };
        let mut out = [7.0f32; 16];

        let err = pipe.acquire(&mut drv, &mut Passthrough, &mut out).unwrap_err();
        assert_eq!(err, CaptureError::ShortRead { wanted: 64, got: 60 });
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_empty_request() {
        let mut pipe = AcquisitionPipeline::<i32>::new(&DeviceConfig::default());
        let mut drv = Constant { value: 1i32, short_by: 0 };
        assert_eq!(pipe.acquire(&mut drv, &mut Passthrough, &mut []).unwrap(), 0);
    }
}
