//! Audio capture core.
//!
//! Architecture:
//! - [`AudioSource`]: facade used by the analysis task
//! - [`AcquisitionPipeline`]: one block per call, zero block on any failure
//! - [`AdcChannelCorrector`]: tag check + low-pass for shared-ADC words
//! - Variants: [`I2sSource`], [`CodecSource`], [`AdcSource`], dispatched
//!   through [`AudioInput`]

pub mod adc_filter;
pub mod adc_source;
pub mod codec_source;
pub mod i2s_source;
pub mod input;
pub mod pipeline;
pub mod source;

pub use adc_filter::{AdcChannelCorrector, MAX_CONSECUTIVE_REJECTS};
pub use adc_source::{adc1_channel, analog_channel, AdcSource};
pub use codec_source::{CodecSource, ControlBus};
pub use i2s_source::I2sSource;
pub use input::AudioInput;
pub use pipeline::{AcquisitionPipeline, Passthrough, SampleProcessor};
pub use source::{AudioSource, AudioSourceType};
