//! I2S capture driver binding.
//!
//! The core only needs a blocking word supply plus install/uninstall. On
//! device [`EspI2sDriver`] wraps the legacy ESP-IDF I2S driver on port 0
//! (the only port with MCLK routing, ADC and PDM support). Tests drive the
//! sources with scripted fakes implementing the same traits.

use core::time::Duration;

use crate::config::{ChannelFormat, DeviceConfig};
use crate::error::DriverError;
use crate::hal::gpio::GpioNum;
use crate::sample::RawSample;

/// Bus role of the I2S peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2sRole {
    Master,
    /// Experimental: external device drives the clocks
    Slave,
}

/// Receive mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxMode {
    /// Standard Philips I2S
    Standard,
    /// PDM microphone (clock + data only)
    Pdm,
    /// Built-in ADC sampled through I2S
    AdcBuiltIn,
}

/// Parameters passed to `install`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    pub role: I2sRole,
    pub rx_mode: RxMode,
    pub sample_rate: u32,
    /// Bits per sample (16 or 32)
    pub bits_per_sample: u32,
    pub channel_format: ChannelFormat,
    pub dma_buf_count: u32,
    /// Frames per DMA buffer
    pub dma_buf_len: u32,
    /// Use the audio PLL as clock source
    pub use_apll: bool,
    /// Fixed MCLK frequency in Hz (0 = derived)
    pub fixed_mclk: u32,
}

impl DriverConfig {
    /// Standard receive configuration for a digital microphone.
    pub fn digital<W: RawSample>(cfg: &DeviceConfig) -> Self {
        Self {
            role: if cfg.i2s_master {
                I2sRole::Master
            } else {
                I2sRole::Slave
            },
            rx_mode: RxMode::Standard,
            sample_rate: cfg.sample_rate,
            bits_per_sample: W::BITS,
            channel_format: cfg.channel_format,
            dma_buf_count: 8,
            dma_buf_len: cfg.block_size as u32,
            use_apll: false,
            fixed_mclk: 0,
        }
    }

    /// Built-in ADC configuration (always master, left slot, no APLL).
    pub fn adc<W: RawSample>(cfg: &DeviceConfig) -> Self {
        Self {
            role: I2sRole::Master,
            rx_mode: RxMode::AdcBuiltIn,
            sample_rate: cfg.sample_rate,
            bits_per_sample: W::BITS,
            channel_format: ChannelFormat::OnlyLeft,
            dma_buf_count: 8,
            dma_buf_len: cfg.block_size as u32,
            use_apll: false,
            fixed_mclk: 0,
        }
    }

    /// Switch to PDM receive (no bit clock line).
    ///
    /// PDM is always master and captures the left slot in mono.
    pub fn into_pdm(mut self) -> Self {
        self.role = I2sRole::Master;
        self.rx_mode = RxMode::Pdm;
        self.channel_format = ChannelFormat::mic_default();
        self.use_apll = true;
        self
    }

    /// Apply clock-source rules for the master-clock line and the
    /// configured role (`i2s_master` as requested, before any PDM override).
    pub fn with_clocking(mut self, mclk: Option<GpioNum>, i2s_master: bool) -> Self {
        if self.role == I2sRole::Slave {
            // Slave mode still has to drive MCLK
            self.use_apll = true;
            self.fixed_mclk = 512 * self.sample_rate;
        }
        if mclk.is_some() {
            self.use_apll = true;
        }
        if !i2s_master && self.rx_mode == RxMode::Pdm {
            // APLL does not work in PDM slave mode
            self.use_apll = false;
            self.fixed_mclk = 0;
        }
        self
    }
}

/// Pin routing passed to `set_pins`. `None` = not connected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinConfig {
    pub mck: Option<GpioNum>,
    pub bck: Option<GpioNum>,
    pub ws: Option<GpioNum>,
    pub data_in: Option<GpioNum>,
}

/// Slot layout passed to `set_clock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    Mono,
    Stereo,
}

/// Blocking word supply with install/uninstall lifecycle.
pub trait CaptureDriver {
    /// Word type delivered by `read`.
    type Word: RawSample;

    fn install(&mut self, config: &DriverConfig) -> Result<(), DriverError>;

    fn set_pins(&mut self, pins: &PinConfig) -> Result<(), DriverError>;

    fn set_clock(&mut self, rate: u32, bits: u32, mode: ChannelMode) -> Result<(), DriverError>;

    /// Block until `words` is full or `timeout` expires (`None` = forever).
    ///
    /// Returns the number of BYTES written into `words`.
    fn read(&mut self, words: &mut [Self::Word], timeout: Option<Duration>)
        -> Result<usize, DriverError>;

    fn uninstall(&mut self) -> Result<(), DriverError>;

    /// SPH0645 timing fix: delay RX sampling by one bit and shift MSB.
    fn apply_rx_msb_shift(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Extra lifecycle for the built-in ADC front-end.
pub trait AdcCaptureDriver: CaptureDriver {
    /// Route ADC1 `channel` into the I2S peripheral (11 dB attenuation).
    fn set_adc_mode(&mut self, channel: u8) -> Result<(), DriverError>;

    fn adc_enable(&mut self) -> Result<(), DriverError>;

    fn adc_disable(&mut self) -> Result<(), DriverError>;

    fn stop(&mut self) -> Result<(), DriverError>;
}

/// FreeRTOS `portMAX_DELAY`: block without timeout.
pub const WAIT_FOREVER_TICKS: u32 = u32::MAX;

/// Read timeout in RTOS ticks at `tick_rate_hz`.
///
/// `None` waits forever. Bounded timeouts round down, never reach
/// [`WAIT_FOREVER_TICKS`] and are at least one tick.
pub fn timeout_ticks(timeout: Option<Duration>, tick_rate_hz: u32) -> u32 {
    match timeout {
        None => WAIT_FOREVER_TICKS,
        Some(t) => {
            let ticks = t.as_millis().saturating_mul(tick_rate_hz as u128) / 1000;
            ticks.clamp(1, (WAIT_FOREVER_TICKS - 1) as u128) as u32
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::EspI2sDriver;

#[cfg(target_os = "espidf")]
mod esp {
    use core::marker::PhantomData;
    use core::time::Duration;

    use esp_idf_svc::sys::{self, esp_err_t, ESP_OK};

    use super::{
        AdcCaptureDriver, CaptureDriver, ChannelMode, DriverConfig, I2sRole, PinConfig, RxMode,
    };
    use crate::config::ChannelFormat;
    use crate::error::DriverError;
    use crate::sample::I2sWord;

    const PORT: sys::i2s_port_t = sys::i2s_port_t_I2S_NUM_0;

    // I2S_PIN_NO_CHANGE
    const NO_PIN: i32 = -1;

    fn check(err: esp_err_t) -> Result<(), DriverError> {
        if err == ESP_OK as esp_err_t {
            Ok(())
        } else {
            Err(DriverError::new(err))
        }
    }

    fn pin(line: Option<u8>) -> i32 {
        line.map(i32::from).unwrap_or(NO_PIN)
    }

    /// Legacy ESP-IDF I2S driver on port 0.
    pub struct EspI2sDriver {
        installed: bool,
        _not_sync: PhantomData<*const ()>,
    }

    impl EspI2sDriver {
        /// Only one instance should exist: it owns I2S port 0.
        pub fn new() -> Self {
            Self {
                installed: false,
                _not_sync: PhantomData,
            }
        }
    }

    impl Default for EspI2sDriver {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CaptureDriver for EspI2sDriver {
        type Word = I2sWord;

        fn install(&mut self, config: &DriverConfig) -> Result<(), DriverError> {
            let mut mode = sys::i2s_mode_t_I2S_MODE_RX;
            mode |= match config.role {
                I2sRole::Master => sys::i2s_mode_t_I2S_MODE_MASTER,
                I2sRole::Slave => sys::i2s_mode_t_I2S_MODE_SLAVE,
            };
            match config.rx_mode {
                RxMode::Standard => {}
                RxMode::Pdm => mode |= sys::i2s_mode_t_I2S_MODE_PDM,
                RxMode::AdcBuiltIn => mode |= sys::i2s_mode_t_I2S_MODE_ADC_BUILT_IN,
            }

            let channel_format = match config.channel_format {
                ChannelFormat::OnlyLeft => sys::i2s_channel_fmt_t_I2S_CHANNEL_FMT_ONLY_LEFT,
                ChannelFormat::OnlyRight => sys::i2s_channel_fmt_t_I2S_CHANNEL_FMT_ONLY_RIGHT,
            };

            let mut cfg: sys::i2s_config_t = Default::default();
            cfg.mode = mode;
            cfg.sample_rate = config.sample_rate;
            cfg.bits_per_sample = config.bits_per_sample;
            cfg.channel_format = channel_format;
            cfg.communication_format = sys::i2s_comm_format_t_I2S_COMM_FORMAT_STAND_I2S;
            cfg.intr_alloc_flags = sys::ESP_INTR_FLAG_LEVEL2 as i32;
            cfg.__bindgen_anon_1.dma_buf_count = config.dma_buf_count as i32;
            cfg.__bindgen_anon_2.dma_buf_len = config.dma_buf_len as i32;
            cfg.use_apll = config.use_apll;
            cfg.fixed_mclk = config.fixed_mclk as i32;
            cfg.bits_per_chan = config.bits_per_sample;

            // SAFETY: cfg outlives the call, no event queue requested.
            check(unsafe { sys::i2s_driver_install(PORT, &cfg, 0, core::ptr::null_mut()) })?;
            self.installed = true;
            Ok(())
        }

        fn set_pins(&mut self, pins: &PinConfig) -> Result<(), DriverError> {
            let cfg = sys::i2s_pin_config_t {
                mck_io_num: pin(pins.mck),
                bck_io_num: pin(pins.bck),
                ws_io_num: pin(pins.ws),
                data_out_num: NO_PIN,
                data_in_num: pin(pins.data_in),
            };
            // SAFETY: cfg outlives the call.
            check(unsafe { sys::i2s_set_pin(PORT, &cfg) })
        }

        fn set_clock(&mut self, rate: u32, bits: u32, mode: ChannelMode) -> Result<(), DriverError> {
            let ch = match mode {
                ChannelMode::Mono => sys::i2s_channel_t_I2S_CHANNEL_MONO,
                ChannelMode::Stereo => sys::i2s_channel_t_I2S_CHANNEL_STEREO,
            };
            // SAFETY: plain value arguments.
            check(unsafe { sys::i2s_set_clk(PORT, rate, bits, ch) })
        }

        fn read(
            &mut self,
            words: &mut [I2sWord],
            timeout: Option<Duration>,
        ) -> Result<usize, DriverError> {
            let ticks = super::timeout_ticks(timeout, sys::configTICK_RATE_HZ as u32);
            let mut bytes_read: usize = 0;
            // SAFETY: words is a valid, exclusively borrowed buffer of the given size.
            check(unsafe {
                sys::i2s_read(
                    PORT,
                    words.as_mut_ptr() as *mut core::ffi::c_void,
                    core::mem::size_of_val(words),
                    &mut bytes_read,
                    ticks,
                )
            })?;
            Ok(bytes_read)
        }

        fn uninstall(&mut self) -> Result<(), DriverError> {
            if !self.installed {
                return Ok(());
            }
            self.installed = false;
            // SAFETY: driver was installed on PORT by this instance.
            check(unsafe { sys::i2s_driver_uninstall(PORT) })
        }

        fn apply_rx_msb_shift(&mut self) -> Result<(), DriverError> {
            // Registers only exist on the classic ESP32
            #[cfg(esp32)]
            // SAFETY: read-modify-write of I2S0 timing/conf registers after install.
            unsafe {
                let timing = sys::DR_REG_I2S_BASE + 0x001c;
                let conf = sys::DR_REG_I2S_BASE + 0x0008;
                let t = core::ptr::read_volatile(timing as *const u32);
                core::ptr::write_volatile(timing as *mut u32, t | (1 << 9));
                let c = core::ptr::read_volatile(conf as *const u32);
                core::ptr::write_volatile(conf as *mut u32, c | sys::I2S_RX_MSB_SHIFT);
            }
            Ok(())
        }
    }

    impl AdcCaptureDriver for EspI2sDriver {
        fn set_adc_mode(&mut self, channel: u8) -> Result<(), DriverError> {
            // SAFETY: channel validated as ADC1 0..=9 by the caller.
            unsafe {
                sys::adc_gpio_init(sys::adc_unit_t_ADC_UNIT_1, channel as sys::adc_channel_t);
                check(sys::i2s_set_adc_mode(
                    sys::adc_unit_t_ADC_UNIT_1,
                    channel as sys::adc1_channel_t,
                ))?;
                check(sys::adc1_config_channel_atten(
                    channel as sys::adc1_channel_t,
                    sys::adc_atten_t_ADC_ATTEN_DB_11,
                ))
            }
        }

        fn adc_enable(&mut self) -> Result<(), DriverError> {
            // SAFETY: port 0 installed in ADC mode.
            check(unsafe { sys::i2s_adc_enable(PORT) })
        }

        fn adc_disable(&mut self) -> Result<(), DriverError> {
            // SAFETY: port 0 installed in ADC mode.
            check(unsafe { sys::i2s_adc_disable(PORT) })
        }

        fn stop(&mut self) -> Result<(), DriverError> {
            // SAFETY: harmless if not started.
            check(unsafe { sys::i2s_stop(PORT) })
        }
    }
}
