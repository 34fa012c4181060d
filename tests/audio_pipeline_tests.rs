//! Block acquisition tests

mod common;

use std::time::Duration;

use audioreactive_input::audio::{AcquisitionPipeline, Passthrough, SampleProcessor};
use audioreactive_input::{CaptureError, DeviceConfig, DriverError, I2S_SAMPLES_MAX};
use common::{Read, ScriptedDriver};

fn pipeline(scale: f32) -> AcquisitionPipeline<i32> {
    AcquisitionPipeline::new(&DeviceConfig::new(22050, 64).with_scale(scale))
}

/// Negates every word, to check the processor runs before normalization.
struct Negate;

impl SampleProcessor<i32> for Negate {
    fn process(&mut self, word: i32) -> i32 {
        -word
    }
}

#[test]
fn test_mid_scale_block() {
    let mut pipe = pipeline(1.0);
    let mut drv = ScriptedDriver::constant(32768i32);
    let mut out = [0.0f32; 64];

    let n = pipe.acquire(&mut drv, &mut Passthrough, &mut out).unwrap();

    assert_eq!(n, 64);
    assert!(out.iter().all(|&s| s == 0.5));
    assert_eq!(drv.last_read_len, 64);
}

#[test]
fn test_scale_applied() {
    let mut pipe = pipeline(2.5);
    let mut drv = ScriptedDriver::constant(1i32 << 16);
    let mut out = [0.0f32; 16];

    pipe.acquire(&mut drv, &mut Passthrough, &mut out).unwrap();

    assert!(out.iter().all(|&s| s == 2.5));
}

#[test]
fn test_order_preserved() {
    let mut pipe = pipeline(1.0);
    let mut drv = ScriptedDriver::new().then(Read::Words(vec![1 << 16, 2 << 16, 3 << 16]));
    let mut out = [0.0f32; 6];

    pipe.acquire(&mut drv, &mut Passthrough, &mut out).unwrap();

    assert_eq!(out, [1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
}

#[test]
fn test_processor_runs_before_normalization() {
    let mut pipe = pipeline(1.0);
    let mut drv = ScriptedDriver::constant(1i32 << 16);
    let mut out = [0.0f32; 8];

    pipe.acquire(&mut drv, &mut Negate, &mut out).unwrap();

    assert!(out.iter().all(|&s| s == -1.0));
}

#[test]
fn test_request_clamped_to_max() {
    let mut pipe = pipeline(1.0);
    let mut drv = ScriptedDriver::constant(1i32 << 16);
    let mut out = vec![7.0f32; 700];

    let n = pipe.acquire(&mut drv, &mut Passthrough, &mut out).unwrap();

    assert_eq!(n, I2S_SAMPLES_MAX);
    assert_eq!(drv.last_read_len, I2S_SAMPLES_MAX);
    assert!(out[..I2S_SAMPLES_MAX].iter().all(|&s| s == 1.0));
    // Tail is zeroed, never left stale
    assert!(out[I2S_SAMPLES_MAX..].iter().all(|&s| s == 0.0));
}

#[test]
fn test_empty_request_skips_driver() {
    let mut pipe = pipeline(1.0);
    let mut drv = ScriptedDriver::constant(1i32);
    let mut out: [f32; 0] = [];

    assert_eq!(pipe.acquire(&mut drv, &mut Passthrough, &mut out), Ok(0));
    assert_eq!(drv.read_count, 0);
}

#[test]
fn test_short_read_gives_zero_block() {
    let mut pipe = pipeline(1.0);
    let mut drv = ScriptedDriver::constant(1i32 << 16).then(Read::Short(10));
    let mut out = [9.0f32; 64];

    let res = pipe.acquire(&mut drv, &mut Passthrough, &mut out);

    assert_eq!(res, Err(CaptureError::ShortRead { wanted: 256, got: 10 }));
    assert!(out.iter().all(|&s| s == 0.0));

    // Next block is fine again
    assert_eq!(pipe.acquire(&mut drv, &mut Passthrough, &mut out), Ok(64));
    assert!(out.iter().all(|&s| s == 1.0));
}

#[test]
fn test_read_failure_gives_zero_block() {
    let mut pipe = pipeline(1.0);
    let mut drv = ScriptedDriver::constant(1i32 << 16).then(Read::Fail(-1));
    let mut out = [9.0f32; 32];

    let res = pipe.acquire(&mut drv, &mut Passthrough, &mut out);

    assert_eq!(res, Err(CaptureError::Read(DriverError::new(-1))));
    assert!(out.iter().all(|&s| s == 0.0));
}

#[test]
fn test_read_timeout_forwarded() {
    let mut drv = ScriptedDriver::constant(0i32);
    let mut out = [0.0f32; 4];

    let mut bounded = pipeline(1.0);
    bounded.acquire(&mut drv, &mut Passthrough, &mut out).unwrap();
    assert_eq!(drv.last_timeout, Some(Some(Duration::from_millis(250))));

    let mut forever =
        AcquisitionPipeline::<i32>::new(&DeviceConfig::new(22050, 64).with_timeout(None));
    forever.acquire(&mut drv, &mut Passthrough, &mut out).unwrap();
    assert_eq!(drv.last_timeout, Some(None));
}

#[test]
fn test_narrow_words() {
    let mut pipe = AcquisitionPipeline::<i16>::new(&DeviceConfig::new(22050, 64));
    let mut drv = ScriptedDriver::constant(1234i16);
    let mut out = [0.0f32; 32];

    assert_eq!(pipe.acquire(&mut drv, &mut Passthrough, &mut out), Ok(32));
    assert!(out.iter().all(|&s| s == 1234.0));

    // 16-bit words: byte count is twice the word count
    let mut drv = ScriptedDriver::constant(1i16).then(Read::Short(63));
    let res = pipe.acquire(&mut drv, &mut Passthrough, &mut out);
    assert_eq!(res, Err(CaptureError::ShortRead { wanted: 64, got: 63 }));
}
