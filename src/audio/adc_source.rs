//! Analog microphone on an ADC1 pad, sampled through I2S.
//!
//! The I2S peripheral clocks the built-in ADC, so one pad can be sampled
//! at audio rates without software timing. ADC1 is shared with other
//! users (WiFi calibration, analogRead), which is why every word is
//! checked by [`AdcChannelCorrector`] before normalization.
//!
//! By default the ADC is only enabled around each block so other users
//! get a chance between blocks. With the `grab-adc-completely` feature it
//! stays enabled from `initialize` to `deinitialize`.

use crate::audio::adc_filter::AdcChannelCorrector;
use crate::audio::i2s_source::claim_line;
use crate::audio::pipeline::{record_capture_error, AcquisitionPipeline};
use crate::audio::source::{AudioSource, AudioSourceType};
use crate::config::{CapturePins, DeviceConfig};
use crate::error::{CaptureError, InitError};
use crate::fault::CaptureStats;
use crate::hal::gpio::{ClaimedLines, GpioNum, LineAllocator};
use crate::hal::i2s::{AdcCaptureDriver, DriverConfig};

/// Highest ADC1 channel number.
pub const ADC1_MAX_CHANNEL: u8 = 9;

/// Analog channel behind an ESP32 pad.
///
/// ADC1 channels are returned as `0..=7`, ADC2 channels as `10 + n`.
/// `None` for pads without an analog function.
pub fn analog_channel(line: GpioNum) -> Option<u8> {
    Some(match line {
        36 => 0,
        37 => 1,
        38 => 2,
        39 => 3,
        32 => 4,
        33 => 5,
        34 => 6,
        35 => 7,
        4 => 10,
        0 => 11,
        2 => 12,
        15 => 13,
        13 => 14,
        12 => 15,
        14 => 16,
        27 => 17,
        25 => 18,
        26 => 19,
        _ => return None,
    })
}

/// ADC1 channel usable for I2S sampling, if any.
pub fn adc1_channel(line: GpioNum) -> Option<u8> {
    analog_channel(line).filter(|&ch| ch <= ADC1_MAX_CHANNEL)
}

/// Shared-ADC capture source.
pub struct AdcSource<'a, D: AdcCaptureDriver, L: LineAllocator + ?Sized> {
    driver: D,
    lines: &'a L,
    config: DeviceConfig,
    pipeline: AcquisitionPipeline<D::Word>,
    corrector: AdcChannelCorrector,
    claimed: ClaimedLines,
    channel: Option<u8>,
    grab_adc: bool,
    adc_enabled: bool,
    installed: bool,
    initialized: bool,
    last_init_error: Option<InitError>,
    stats: CaptureStats,
}

impl<'a, D: AdcCaptureDriver, L: LineAllocator + ?Sized> AdcSource<'a, D, L> {
    /// The ADC path is always I2S master.
    pub fn new(driver: D, lines: &'a L, config: DeviceConfig) -> Self {
        let config = config.with_master(true);
        Self {
            pipeline: AcquisitionPipeline::new(&config),
            driver,
            lines,
            config,
            corrector: AdcChannelCorrector::new(),
            claimed: ClaimedLines::new(),
            channel: None,
            grab_adc: cfg!(feature = "grab-adc-completely"),
            adc_enabled: false,
            installed: false,
            initialized: false,
            last_init_error: None,
            stats: CaptureStats::new(),
        }
    }

    /// Keep the ADC enabled for the whole session instead of per block.
    pub fn with_adc_grab(mut self, grab: bool) -> Self {
        self.grab_adc = grab;
        self
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

    /// ADC1 channel in use (`None` while uninitialized).
    pub fn channel(&self) -> Option<u8> {
        self.channel
    }

    pub fn corrector(&self) -> &AdcChannelCorrector {
        &self.corrector
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

    fn try_initialize(&mut self, pins: CapturePins) -> Result<u8, InitError> {
        let pad = pins.sd.ok_or(InitError::MissingLine)?;
        claim_line(&mut self.claimed, self.lines, pad, false)?;

        let channel = adc1_channel(pad).ok_or_else(|| {
            crate::ar_error!("line {} has no ADC1 channel", pad);
            InitError::NotAnalogLine { line: pad }
        })?;

        let drv_cfg = DriverConfig::adc::<D::Word>(&self.config);
        self.driver.install(&drv_cfg).map_err(|e| {
            crate::ar_error!("I2S ADC driver install failed: {}", e);
            InitError::DriverInstall(e)
        })?;
        self.installed = true;

        self.driver.set_adc_mode(channel).map_err(|e| {
            crate::ar_error!("I2S ADC mode failed: {}", e);
            InitError::AdcMode(e)
        })?;

        if self.grab_adc {
            match self.driver.adc_enable() {
                Ok(()) => self.adc_enabled = true,
                Err(e) => crate::ar_debug!("ADC enable failed: {}", e),
            }
        }
        Ok(channel)
    }

    fn teardown(&mut self) {
        if self.installed {
            if self.adc_enabled {
                if let Err(e) = self.driver.adc_disable() {
                    crate::ar_debug!("ADC disable failed: {}", e);
                }
                self.adc_enabled = false;
            }
            if let Err(e) = self.driver.stop() {
                crate::ar_debug!("I2S stop failed: {}", e);
            }
            if let Err(e) = self.driver.uninstall() {
                crate::ar_debug!("I2S driver uninstall failed: {}", e);
            }
            self.installed = false;
        }
        self.claimed.release_all(self.lines);
    }

    /// Move corrector events into the stats.
    fn collect_corrector_events(&mut self) {
        self.stats.record_rejected(self.corrector.take_rejected());
        if self.corrector.take_tripped() {
            self.stats.record_correction_disabled();
            crate::ar_warn!(
                "ADC channel {:?}: too many foreign samples, correction disabled",
                self.channel
            );
        }
    }
}

impl<'a, D: AdcCaptureDriver, L: LineAllocator + ?Sized> AudioSource for AdcSource<'a, D, L> {
    fn initialize(&mut self, pins: CapturePins) {
        if self.initialized {
            crate::ar_debug!("ADC source already initialized");
            return;
        }
        self.corrector.reset(None);

        match self.try_initialize(pins) {
            Ok(channel) => {
                self.channel = Some(channel);
                self.corrector.reset(Some(channel));
                self.initialized = true;
                self.last_init_error = None;
                crate::ar_info!("ADC capture started on channel {}", channel);
            }
            Err(e) => {
                self.teardown();
                self.last_init_error = Some(e);
                self.stats.record_init_failure();
                crate::ar_error!("{}: ADC init failed: {}", e.code(), e);
            }
        }
    }

    fn deinitialize(&mut self) {
        self.initialized = false;
        self.channel = None;
        self.corrector.reset(None);
        self.teardown();
    }

    fn get_samples(&mut self, buffer: &mut [f32]) -> usize {
        buffer.fill(0.0);
        if !self.initialized {
            return 0;
        }

        if !self.grab_adc {
            if let Err(e) = self.driver.adc_enable() {
                record_capture_error(&self.stats, CaptureError::AdcEnable(e));
                return 0;
            }
        }

        let result = self
            .pipeline
            .acquire(&mut self.driver, &mut self.corrector, buffer);

        if !self.grab_adc {
            if let Err(e) = self.driver.adc_disable() {
                crate::ar_debug!("ADC disable failed: {}", e);
            }
        }

        self.collect_corrector_events();
        match result {
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
        AudioSourceType::I2sAdc
    }
}
