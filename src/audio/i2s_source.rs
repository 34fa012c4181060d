//! Digital I2S / PDM microphone source.
//!
//! Bring-up order:
//!
//! ```text
//! claim WS, SD ─▶ claim SCK (or PDM) ─▶ claim MCLK ─▶ install ─▶ set_pins ─▶ set_clock ─▶ [MSB shift]
//! ```
//!
//! Every line handed to the driver is claimed first; `None` lines are
//! simply left unrouted.
//!
//! Any failing step unwinds everything before it, so a failed
//! `initialize` leaves the allocator exactly as it found it.

use crate::audio::pipeline::{record_capture_error, AcquisitionPipeline, Passthrough};
use crate::audio::source::{AudioSource, AudioSourceType};
use crate::config::{CapturePins, DeviceConfig};
use crate::error::InitError;
use crate::fault::CaptureStats;
use crate::hal::gpio::{ClaimedLines, GpioNum, LineAllocator, LineError};
use crate::hal::i2s::{CaptureDriver, ChannelMode, DriverConfig, PinConfig, RxMode};
use crate::sample::RawSample;

/// Claim `line` for audio, mapping refusal to an init error.
pub(crate) fn claim_line<L: LineAllocator + ?Sized>(
    claimed: &mut ClaimedLines,
    alloc: &L,
    line: GpioNum,
    output: bool,
) -> Result<(), InitError> {
    claimed.claim(alloc, line, output).map_err(|e| {
        match e {
            LineError::InUse { owner } => {
                crate::ar_error!("line {} already owned by {:?}", line, owner)
            }
            LineError::Invalid => crate::ar_error!("line {} not available", line),
        }
        InitError::LineInUse { line }
    })
}

/// Digital bus capture source.
pub struct I2sSource<'a, D: CaptureDriver, L: LineAllocator + ?Sized> {
    driver: D,
    lines: &'a L,
    config: DeviceConfig,
    pipeline: AcquisitionPipeline<D::Word>,
    claimed: ClaimedLines,
    installed: bool,
    initialized: bool,
    /// SPH0645: delay RX by one bit after init, ignore MCLK
    msb_shift: bool,
    last_driver_config: Option<DriverConfig>,
    last_init_error: Option<InitError>,
    stats: CaptureStats,
}

impl<'a, D: CaptureDriver, L: LineAllocator + ?Sized> I2sSource<'a, D, L> {
    /// Generic I2S or PDM microphone.
    pub fn new(driver: D, lines: &'a L, config: DeviceConfig) -> Self {
        Self {
            pipeline: AcquisitionPipeline::new(&config),
            driver,
            lines,
            config,
            claimed: ClaimedLines::new(),
            installed: false,
            initialized: false,
            msb_shift: false,
            last_driver_config: None,
            last_init_error: None,
            stats: CaptureStats::new(),
        }
    }

    /// SPH0645 microphone (RX MSB shift applied after init).
    pub fn sph0645(driver: D, lines: &'a L, config: DeviceConfig) -> Self {
        let mut source = Self::new(driver, lines, config);
        source.msb_shift = true;
        source
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn last_init_error(&self) -> Option<InitError> {
        self.last_init_error
    }

    /// Configuration passed to the last driver install.
    pub fn driver_config(&self) -> Option<&DriverConfig> {
        self.last_driver_config.as_ref()
    }

    pub fn claimed_lines(&self) -> &ClaimedLines {
        &self.claimed
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    fn try_initialize(&mut self, pins: CapturePins) -> Result<(), InitError> {
        let mclk = if self.msb_shift { None } else { pins.mclk };

        if let Some(ws) = pins.ws {
            claim_line(&mut self.claimed, self.lines, ws, true)?;
        }
        if let Some(sd) = pins.sd {
            claim_line(&mut self.claimed, self.lines, sd, false)?;
        }

        let mut drv_cfg = DriverConfig::digital::<D::Word>(&self.config);
        match pins.sck {
            Some(sck) => claim_line(&mut self.claimed, self.lines, sck, true)?,
            // No bit clock: PDM microphone, WS is the PDM clock
            None => drv_cfg = drv_cfg.into_pdm(),
        }
        let drv_cfg = drv_cfg.with_clocking(mclk, self.config.i2s_master);

        if !self.config.i2s_master {
            crate::ar_warn!("I2S slave mode is experimental");
        }

        if let Some(line) = mclk {
            claim_line(&mut self.claimed, self.lines, line, true)?;
        }

        self.last_driver_config = Some(drv_cfg);
        self.driver.install(&drv_cfg).map_err(|e| {
            crate::ar_error!("I2S driver install failed: {}", e);
            InitError::DriverInstall(e)
        })?;
        self.installed = true;

        crate::ar_debug!(
            "I2S {} {:?}, apll={} fixed_mclk={} bits={} scale={}",
            if drv_cfg.rx_mode == RxMode::Pdm { "PDM" } else { "std" },
            drv_cfg.role,
            drv_cfg.use_apll,
            drv_cfg.fixed_mclk,
            drv_cfg.bits_per_sample,
            self.config.sample_scale
        );

        let pin_cfg = PinConfig {
            mck: mclk,
            bck: pins.sck,
            ws: pins.ws,
            data_in: pins.sd,
        };
        self.driver.set_pins(&pin_cfg).map_err(|e| {
            crate::ar_error!("I2S pin config failed: {}", e);
            InitError::SetPins(e)
        })?;

        self.driver
            .set_clock(
                self.config.sample_rate,
                <D::Word as RawSample>::BITS,
                ChannelMode::Mono,
            )
            .map_err(|e| {
                crate::ar_error!("I2S clock config failed: {}", e);
                InitError::SetClock(e)
            })?;

        if self.msb_shift {
            if let Err(e) = self.driver.apply_rx_msb_shift() {
                crate::ar_warn!("SPH0645 timing fix not applied: {}", e);
            }
        }
        Ok(())
    }

    /// Uninstall (if installed) and give back every claimed line.
    fn teardown(&mut self) {
        if self.installed {
            if let Err(e) = self.driver.uninstall() {
                crate::ar_debug!("I2S driver uninstall failed: {}", e);
            }
            self.installed = false;
        }
        self.claimed.release_all(self.lines);
    }
}

impl<'a, D: CaptureDriver, L: LineAllocator + ?Sized> AudioSource for I2sSource<'a, D, L> {
    fn initialize(&mut self, pins: CapturePins) {
        if self.initialized {
            crate::ar_debug!("I2S source already initialized");
            return;
        }

        match self.try_initialize(pins) {
            Ok(()) => {
                self.initialized = true;
                self.last_init_error = None;
                crate::ar_info!("I2S capture started at {} Hz", self.config.sample_rate);
            }
            Err(e) => {
                self.teardown();
                self.last_init_error = Some(e);
                self.stats.record_init_failure();
                crate::ar_error!("{}: I2S init failed: {}", e.code(), e);
            }
        }
    }

    fn deinitialize(&mut self) {
        self.initialized = false;
        self.teardown();
    }

    fn get_samples(&mut self, buffer: &mut [f32]) -> usize {
        if !self.initialized {
            buffer.fill(0.0);
            return 0;
        }
        match self
            .pipeline
            .acquire(&mut self.driver, &mut Passthrough, buffer)
        {
            Ok(n) => {
                if n > 0 {
                    self.stats.record_block();
                }
                n
            }
            Err(e) => {
                record_capture_error(&self.stats, e);
                0
            }
        }
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn source_type(&self) -> AudioSourceType {
        AudioSourceType::I2sDigital
    }
}
