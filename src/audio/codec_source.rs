//! I2S source behind a codec that needs control-bus programming.
//!
//! ```text
//! Unconfigured ──join bus──▶ BusJoined ──program──▶ DeviceProgrammed ──I2S init──▶ CaptureStarted
//!      ▲                         │                        │                           │
//!      └──────── failure ────────┴────────────────────────┴──────── deinitialize ─────┘
//! ```
//!
//! Joining the bus is the only hard precondition. Register writes are
//! best effort: single dropped acks are logged and ignored, only a device
//! that acknowledges nothing at all stops the bring-up. A bring-up that
//! stops gives back the bus lines it joined; a running source keeps them
//! joined, also after `deinitialize`.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::audio::i2s_source::I2sSource;
use crate::audio::source::{AudioSource, AudioSourceType};
use crate::config::{CapturePins, DeviceConfig};
use crate::error::{BusError, InitError};
use crate::fault::CaptureStats;
use crate::hal::codec::{BringUpReport, BringUpState, BusClock, CodecModel};
use crate::hal::gpio::{ClaimedLines, GpioNum, LineAllocator, PinOwner};
use crate::hal::i2s::CaptureDriver;

/// Shared I2C bus handle plus the lines it runs on.
pub struct ControlBus<I, T> {
    pub i2c: I,
    pub delay: T,
    pub sda: Option<GpioNum>,
    pub scl: Option<GpioNum>,
}

impl<I, T> ControlBus<I, T> {
    pub fn new(i2c: I, delay: T, sda: Option<GpioNum>, scl: Option<GpioNum>) -> Self {
        Self { i2c, delay, sda, scl }
    }
}

/// Codec-backed digital source.
pub struct CodecSource<'a, D, L, I, T>
where
    D: CaptureDriver,
    L: LineAllocator + ?Sized,
{
    inner: I2sSource<'a, D, L>,
    lines: &'a L,
    model: CodecModel,
    bus: ControlBus<I, T>,
    state: BringUpState,
    /// Bus lines joined by the bring-up in progress
    joined: ClaimedLines,
    last_report: Option<BringUpReport>,
    bus_error: Option<InitError>,
}

impl<'a, D, L, I, T> CodecSource<'a, D, L, I, T>
where
    D: CaptureDriver,
    L: LineAllocator + ?Sized,
    I: I2c + BusClock,
    T: DelayNs,
{
    /// The codec fixes the I2S slot; `config.channel_format` is overridden.
    pub fn new(
        model: CodecModel,
        driver: D,
        lines: &'a L,
        config: DeviceConfig,
        bus: ControlBus<I, T>,
    ) -> Self {
        let config = config.with_channel(model.channel_format());
        Self {
            inner: I2sSource::new(driver, lines, config),
            lines,
            model,
            bus,
            state: BringUpState::Unconfigured,
            joined: ClaimedLines::with_owner(PinOwner::I2c),
            last_report: None,
            bus_error: None,
        }
    }

    pub fn model(&self) -> CodecModel {
        self.model
    }

    pub fn state(&self) -> BringUpState {
        self.state
    }

    /// Result of the last register programming pass.
    pub fn last_report(&self) -> Option<BringUpReport> {
        self.last_report
    }

    pub fn last_init_error(&self) -> Option<InitError> {
        self.bus_error.or(self.inner.last_init_error())
    }

    pub fn stats(&self) -> &CaptureStats {
        self.inner.stats()
    }

    pub fn i2s(&self) -> &I2sSource<'a, D, L> {
        &self.inner
    }

    pub fn bus(&self) -> &ControlBus<I, T> {
        &self.bus
    }

    /// Undo a partial bring-up: only bus lines this attempt joined.
    fn abort(&mut self) {
        self.joined.release_all(self.lines);
        self.state = BringUpState::Unconfigured;
    }

    fn fail(&mut self, e: InitError) {
        self.abort();
        self.bus_error = Some(e);
        self.inner.stats().record_init_failure();
        crate::ar_error!("{}: {} bring-up failed: {}", e.code(), self.model.name(), e);
    }
}

impl<'a, D, L, I, T> AudioSource for CodecSource<'a, D, L, I, T>
where
    D: CaptureDriver,
    L: LineAllocator + ?Sized,
    I: I2c + BusClock,
    T: DelayNs,
{
    fn initialize(&mut self, pins: CapturePins) {
        if self.inner.is_initialized() {
            crate::ar_debug!("{} source already initialized", self.model.name());
            return;
        }
        self.bus_error = None;
        self.state = BringUpState::Unconfigured;

        match self.lines.join_bus(self.bus.sda, self.bus.scl) {
            Ok(joined) => self.joined = joined,
            Err(e) => {
                crate::ar_error!(
                    "{}: cannot join I2C bus sda={:?} scl={:?}",
                    self.model.name(),
                    self.bus.sda,
                    self.bus.scl
                );
                self.fail(InitError::Bus(e));
                return;
            }
        }
        self.state = BringUpState::BusJoined;

        let hz = self.model.bus_speed_hz();
        if let Err(e) = self.bus.i2c.set_bus_speed(hz) {
            crate::ar_warn!("{}: {}", self.model.name(), e);
        }

        let report = self.model.program(&mut self.bus.i2c, &mut self.bus.delay);
        self.last_report = Some(report);
        if report.writes > 0 && report.failures == report.writes {
            let e = report.first_failure.unwrap_or(BusError::Nack {
                addr: self.model.address(),
                reg: 0,
            });
            self.fail(InitError::Bus(e));
            return;
        }
        self.state = BringUpState::DeviceProgrammed;

        self.inner.initialize(pins);
        if self.inner.is_initialized() {
            // Bus stays joined for as long as the source lives
            self.joined = ClaimedLines::with_owner(PinOwner::I2c);
            self.state = BringUpState::CaptureStarted;
        } else {
            self.abort();
        }
    }

    /// Bus lines stay joined: other users may share the bus.
    fn deinitialize(&mut self) {
        self.inner.deinitialize();
        self.state = BringUpState::Unconfigured;
    }

    fn get_samples(&mut self, buffer: &mut [f32]) -> usize {
        self.inner.get_samples(buffer)
    }

    fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    fn source_type(&self) -> AudioSourceType {
        AudioSourceType::I2sDigital
    }
}
