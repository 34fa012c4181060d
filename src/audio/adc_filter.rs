//! Analog channel validator/corrector.
//!
//! The built-in ADC is shared between channels. When another user of the
//! ADC interleaves a conversion, the I2S stream receives a word tagged with
//! the wrong channel. Such words are replaced by the last corrected value,
//! and every word then goes through a 2-tap low-pass:
//!
//! ```text
//! corrected[i] = (3 * x[i] + corrected[i-1]) / 4
//! x[i] = decoded[i]              tag matches (or channel unknown)
//! x[i] = corrected[i-1]          tag mismatch
//! ```
//!
//! After more than [`MAX_CONSECUTIVE_REJECTS`] mismatches in a row the
//! expected channel is forgotten and tags are no longer checked, so a
//! permanent fault cannot freeze the output on one stale value. Only
//! [`AdcChannelCorrector::reset`] re-arms the check.

use crate::audio::pipeline::SampleProcessor;
use crate::sample::{AdcWord, RawSample};

/// Consecutive rejected words tolerated before tag checks are disabled.
pub const MAX_CONSECUTIVE_REJECTS: u32 = 256;

/// Per-source correction state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdcChannelCorrector {
    /// Last corrected output, in the raw word domain
    last: i32,
    /// Consecutive rejected words
    consecutive: u32,
    /// Channel this source owns (`None` = unknown, no rejection)
    expected: Option<u8>,
    /// Rejected words not yet collected by `take_rejected`
    rejected: u32,
    /// Set when the breaker trips, cleared by `take_tripped`
    tripped: bool,
}

impl AdcChannelCorrector {
    /// Corrector with no channel check.
    pub const fn new() -> Self {
        Self {
            last: 0,
            consecutive: 0,
            expected: None,
            rejected: 0,
            tripped: false,
        }
    }

    /// Corrector expecting words tagged with `channel`.
    pub const fn for_channel(channel: u8) -> Self {
        let mut c = Self::new();
        c.expected = Some(channel);
        c
    }

    /// Clear filter state and set the expected channel.
    pub fn reset(&mut self, channel: Option<u8>) {
        *self = Self::new();
        self.expected = channel;
    }

    pub fn expected_channel(&self) -> Option<u8> {
        self.expected
    }

    /// Last corrected value, in the raw word domain.
    pub fn last(&self) -> i32 {
        self.last
    }

    pub fn consecutive_rejects(&self) -> u32 {
        self.consecutive
    }

    /// Rejected words since the previous call.
    pub fn take_rejected(&mut self) -> u32 {
        core::mem::take(&mut self.rejected)
    }

    /// True once after the breaker trips.
    pub fn take_tripped(&mut self) -> bool {
        core::mem::take(&mut self.tripped)
    }

    /// Validate and filter one raw word.
    pub fn correct<W: RawSample>(&mut self, word: W) -> W {
        let decoded = AdcWord::decode(word);
        let mut sample = decoded.magnitude;

        match self.expected {
            Some(channel) if decoded.channel != channel => {
                // last corrected value, back to the 12-bit domain
                sample = W::state_to_12bit(self.last);
                self.consecutive += 1;
                self.rejected = self.rejected.saturating_add(1);
                if self.consecutive > MAX_CONSECUTIVE_REJECTS {
                    self.expected = None;
                    self.tripped = true;
                }
            }
            _ => self.consecutive = 0,
        }

        // 12 bit -> 10 bit, like the old analogRead path
        let widened = W::widen_from_16(sample) / 4;
        let out = (3 * widened + self.last) / 4;
        self.last = out;
        W::from_i32(out)
    }
}

impl<W: RawSample> SampleProcessor<W> for AdcChannelCorrector {
    #[inline]
    fn process(&mut self, word: W) -> W {
        self.correct(word)
    }
}
