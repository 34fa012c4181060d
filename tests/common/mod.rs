//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use audioreactive_input::hal::codec::BusClock;
use audioreactive_input::hal::i2s::{
    AdcCaptureDriver, CaptureDriver, ChannelMode, DriverConfig, PinConfig,
};
use audioreactive_input::{BusError, DriverError, RawSample};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

/// What the next `read` call does.
#[derive(Debug, Clone)]
pub enum Read<W> {
    /// Deliver these words (repeated/truncated to the request)
    Words(Vec<W>),
    /// Fill the request but report only this many bytes
    Short(usize),
    /// Fail with this driver code
    Fail(i32),
}

/// Scripted capture driver recording every call.
#[derive(Debug)]
pub struct ScriptedDriver<W> {
    pub reads: VecDeque<Read<W>>,
    /// Word delivered once the script runs out
    pub idle_word: W,

    pub fail_install: Option<i32>,
    pub fail_set_pins: Option<i32>,
    pub fail_set_clock: Option<i32>,
    pub fail_adc_mode: Option<i32>,
    pub fail_adc_enable: Option<i32>,

    pub installed: bool,
    pub install_count: u32,
    pub uninstall_count: u32,
    pub config: Option<DriverConfig>,
    pub pins: Option<PinConfig>,
    pub clock: Option<(u32, u32, ChannelMode)>,
    pub msb_shift_count: u32,
    pub adc_channel: Option<u8>,
    pub adc_enabled: bool,
    pub adc_enable_count: u32,
    pub adc_disable_count: u32,
    pub stop_count: u32,
    pub read_count: u32,
    pub last_read_len: usize,
    pub last_timeout: Option<Option<Duration>>,
}

impl<W: RawSample> ScriptedDriver<W> {
    pub fn new() -> Self {
        Self {
            reads: VecDeque::new(),
            idle_word: W::ZERO,
            fail_install: None,
            fail_set_pins: None,
            fail_set_clock: None,
            fail_adc_mode: None,
            fail_adc_enable: None,
            installed: false,
            install_count: 0,
            uninstall_count: 0,
            config: None,
            pins: None,
            clock: None,
            msb_shift_count: 0,
            adc_channel: None,
            adc_enabled: false,
            adc_enable_count: 0,
            adc_disable_count: 0,
            stop_count: 0,
            read_count: 0,
            last_read_len: 0,
            last_timeout: None,
        }
    }

    /// Driver that always delivers `word`.
    pub fn constant(word: W) -> Self {
        let mut d = Self::new();
        d.idle_word = word;
        d
    }

    pub fn then(mut self, read: Read<W>) -> Self {
        self.reads.push_back(read);
        self
    }
}

impl<W: RawSample> CaptureDriver for ScriptedDriver<W> {
    type Word = W;

    fn install(&mut self, config: &DriverConfig) -> Result<(), DriverError> {
        self.config = Some(*config);
        if let Some(code) = self.fail_install {
            return Err(DriverError::new(code));
        }
        self.installed = true;
        self.install_count += 1;
        Ok(())
    }

    fn set_pins(&mut self, pins: &PinConfig) -> Result<(), DriverError> {
        self.pins = Some(*pins);
        match self.fail_set_pins {
            Some(code) => Err(DriverError::new(code)),
            None => Ok(()),
        }
    }

    fn set_clock(&mut self, rate: u32, bits: u32, mode: ChannelMode) -> Result<(), DriverError> {
        self.clock = Some((rate, bits, mode));
        match self.fail_set_clock {
            Some(code) => Err(DriverError::new(code)),
            None => Ok(()),
        }
    }

    fn read(&mut self, words: &mut [W], timeout: Option<Duration>) -> Result<usize, DriverError> {
        self.read_count += 1;
        self.last_read_len = words.len();
        self.last_timeout = Some(timeout);

        match self.reads.pop_front() {
            None => {
                words.fill(self.idle_word);
                Ok(words.len() * W::BYTES)
            }
            Some(Read::Words(src)) => {
                for (i, w) in words.iter_mut().enumerate() {
                    *w = src[i % src.len()];
                }
                Ok(words.len() * W::BYTES)
            }
            Some(Read::Short(bytes)) => {
                words.fill(self.idle_word);
                Ok(bytes)
            }
            Some(Read::Fail(code)) => Err(DriverError::new(code)),
        }
    }

    fn uninstall(&mut self) -> Result<(), DriverError> {
        self.installed = false;
        self.uninstall_count += 1;
        Ok(())
    }

    fn apply_rx_msb_shift(&mut self) -> Result<(), DriverError> {
        self.msb_shift_count += 1;
        Ok(())
    }
}

impl<W: RawSample> AdcCaptureDriver for ScriptedDriver<W> {
    fn set_adc_mode(&mut self, channel: u8) -> Result<(), DriverError> {
        if let Some(code) = self.fail_adc_mode {
            return Err(DriverError::new(code));
        }
        self.adc_channel = Some(channel);
        Ok(())
    }

    fn adc_enable(&mut self) -> Result<(), DriverError> {
        self.adc_enable_count += 1;
        if let Some(code) = self.fail_adc_enable {
            return Err(DriverError::new(code));
        }
        self.adc_enabled = true;
        Ok(())
    }

    fn adc_disable(&mut self) -> Result<(), DriverError> {
        self.adc_disable_count += 1;
        self.adc_enabled = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        self.stop_count += 1;
        Ok(())
    }
}

/// I2C bus that records every write.
#[derive(Debug, Default)]
pub struct RecordingI2c {
    /// (address, bytes) per write, acknowledged or not
    pub writes: Vec<(u8, Vec<u8>)>,
    /// Fail these write indices with a NACK
    pub nack_indices: Vec<usize>,
    /// Fail every write
    pub absent: bool,
    /// (requested Hz, writes sent before the request)
    pub speeds: Vec<(u32, usize)>,
    /// Refuse every speed change
    pub fail_speed: bool,
}

impl RecordingI2c {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absent() -> Self {
        Self {
            absent: true,
            ..Self::default()
        }
    }

    pub fn nack_at(indices: &[usize]) -> Self {
        Self {
            nack_indices: indices.to_vec(),
            ..Self::default()
        }
    }
}

impl ErrorType for RecordingI2c {
    type Error = ErrorKind;
}

impl I2c for RecordingI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let index = self.writes.len();
                    self.writes.push((address, bytes.to_vec()));
                    if self.absent || self.nack_indices.contains(&index) {
                        return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
                    }
                }
                Operation::Read(buf) => buf.fill(0),
            }
        }
        Ok(())
    }
}

impl BusClock for RecordingI2c {
    fn set_bus_speed(&mut self, hz: u32) -> Result<(), BusError> {
        self.speeds.push((hz, self.writes.len()));
        if self.fail_speed {
            return Err(BusError::Clock { hz });
        }
        Ok(())
    }
}

/// Delay that only adds up the requested time.
#[derive(Debug, Default)]
pub struct NoopDelay {
    pub total_ns: u64,
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }
}
