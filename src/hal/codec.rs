//! Control-bus bring-up for I2S front-ends that need register setup.
//!
//! Every supported chip is programmed the same way: a fixed list of
//! register writes (plus an occasional settle delay) sent over I2C before
//! the I2S receiver is started. Writes are best effort: a device that does
//! not acknowledge gets a warning in the log and the sequence continues.
//! The caller decides from the [`BringUpReport`] whether to go on.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::config::{ChannelFormat, InputKind};
use crate::error::BusError;

use ac101_regs::*;
use es8311_regs::*;

/// SCL frequency control for the bus a codec sits on.
///
/// `embedded_hal::i2c::I2c` has no notion of bus speed, so the bus driver
/// implements this next to it.
pub trait BusClock {
    fn set_bus_speed(&mut self, hz: u32) -> Result<(), BusError>;
}

/// APB clock feeding the I2C peripheral.
#[cfg(target_os = "espidf")]
const APB_CLK_HZ: u32 = 80_000_000;

#[cfg(target_os = "espidf")]
impl BusClock for esp_idf_svc::hal::i2c::I2cDriver<'_> {
    fn set_bus_speed(&mut self, hz: u32) -> Result<(), BusError> {
        // SCL high and low time, in APB cycles
        let half = (APB_CLK_HZ / hz.max(1) / 2) as i32;
        // SAFETY: port belongs to this installed driver; plain value arguments.
        let err = unsafe { esp_idf_svc::sys::i2c_set_period(self.port(), half, half) };
        if err == esp_idf_svc::sys::ESP_OK as esp_idf_svc::sys::esp_err_t {
            Ok(())
        } else {
            Err(BusError::Clock { hz })
        }
    }
}

/// One step of a bring-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Write `val` to `reg` (width depends on the chip)
    Write { reg: u8, val: u16 },
    /// Wait before the next write
    DelayMs(u32),
}

const fn w(reg: u8, val: u16) -> Step {
    Step::Write { reg, val }
}

/// ES7243 stereo ADC.
const ES7243_INIT: &[Step] = &[
    w(0x00, 0x01),
    w(0x06, 0x00),
    w(0x05, 0x1B),
    w(0x01, 0x00), // 24 bit
    w(0x08, 0x43),
    w(0x05, 0x13),
];

/// ES8388 codec, line-in (LIN2/RIN2) routed to ADC and looped to line-out.
/// Register numbers are decimal as in the datasheet.
const ES8388_INIT: &[Step] = &[
    w(8, 0b0000_0000),  // I2S slave
    w(2, 0b1111_0011),  // power down DEM and STM
    w(43, 0b1000_0000), // same LRCK for ADC and DAC
    w(0, 0b0000_0101),  // play & record
    w(13, 0b0000_0010), // MCLK/LRCK = 256
    w(1, 0b0100_0000),  // analog and lbias up
    w(3, 0b0000_0000),  // ADC, analog input and mic bias up
    w(4, 0b1111_1100),  // DAC down, LOUT1/ROUT1/LOUT2/ROUT2 up
    w(2, 0b0100_0000),  // DEM and STM up, line-out amp on
    w(10, 0b0101_0000), // LIN2/RIN2 to ADC
    w(9, 0b0000_0000),  // PGA gain 0dB
    w(16, 0b0100_0000), // ADC digital volume -32dB (L)
    w(17, 0b0100_0000), // ADC digital volume -32dB (R)
    w(38, 0b0000_1001), // mixer: LIN2/RIN2 to output
    w(39, 0b0101_0000), // mixer: LIN to mixL, 0dB
    w(42, 0b0101_0000), // mixer: RIN to mixR, 0dB
    w(46, 0b0001_1011), // LOUT1VOL, balance fix
    w(47, 0b0001_1110), // ROUT1VOL 0dB
    w(48, 0b0001_1110), // LOUT2VOL 0dB
    w(49, 0b0001_1110), // ROUT2VOL 0dB
];

/// ES8311 register addresses used during bring-up.
mod es8311_regs {
    pub const RESET: u8 = 0x00;
    pub const CLK_MANAGER1: u8 = 0x01;
    pub const CLK_MANAGER2: u8 = 0x02;
    pub const CLK_MANAGER3: u8 = 0x03;
    pub const CLK_MANAGER4: u8 = 0x04;
    pub const CLK_MANAGER5: u8 = 0x05;
    pub const CLK_MANAGER6: u8 = 0x06;
    pub const CLK_MANAGER7: u8 = 0x07;
    pub const CLK_MANAGER8: u8 = 0x08;
    pub const SDP_OUT: u8 = 0x0A;
    pub const SYSTEM: u8 = 0x0B;
    pub const SYSTEM_0C: u8 = 0x0C;
    pub const SYSTEM_0E: u8 = 0x0E;
    pub const ADC_MUTE: u8 = 0x0F;
    pub const SYSTEM_10: u8 = 0x10;
    pub const SYSTEM_11: u8 = 0x11;
    pub const PGA_GAIN: u8 = 0x14;
    pub const ADC_RAMP: u8 = 0x15;
    pub const ADC_ALC6: u8 = 0x16;
    pub const ADC_VOL: u8 = 0x17;
    pub const ADC_ALC: u8 = 0x18;
    pub const ADC_HPF1: u8 = 0x1B;
    pub const ADC_HPF2: u8 = 0x1C;
    pub const GP_REG: u8 = 0x45;
}

/// ES8311 codec, onboard mic, clocks for 22050 Hz.
const ES8311_INIT: &[Step] = &[
    w(RESET, 0b0001_1111),
    w(GP_REG, 0b0000_0000),
    w(CLK_MANAGER1, 0b0011_1010), // MCLK enable
    w(CLK_MANAGER2, 0b0000_0000),
    w(CLK_MANAGER5, 0b0000_0000),
    w(CLK_MANAGER3, 0b0001_0000),
    w(CLK_MANAGER4, 0b0001_0000),
    w(CLK_MANAGER7, 0b0000_0000),
    w(CLK_MANAGER8, 0b1111_1111),
    w(CLK_MANAGER6, 0b1110_0011),
    w(ADC_ALC6, 0b0010_0100),
    w(SYSTEM, 0b0000_0000),
    w(SYSTEM_0C, 0b0010_0000),
    w(SYSTEM_10, 0b0001_0011),
    w(SYSTEM_11, 0b0111_1100),
    w(RESET, 0b1100_0000), // second reset is required
    w(CLK_MANAGER1, 0b0011_1010),
    w(PGA_GAIN, 0b0001_0000),
    w(SDP_OUT, 0b0000_1000), // I2S, 32 bit
    w(SYSTEM_0E, 0b0000_0010),
    w(ADC_MUTE, 0b0100_0100),
    w(ADC_RAMP, 0b0001_0000),
    w(ADC_HPF1, 0b0000_0101),
    w(ADC_HPF2, 0b0110_0101),
    w(ADC_VOL, 0b1011_1111), // 0dB
    w(ADC_ALC, 0b1000_0001), // ALC on, automute off
];

/// WM8978 codec, line-in to ADC and line-out. Values are 9 bit.
const WM8978_INIT: &[Step] = &[
    w(0, 0b0_0000_0000),  // reset
    w(1, 0b0_0011_1110),  // mic bias and I/O tie-off only
    w(2, 0b1_1011_1111),  // output and amp stages
    w(3, 0b0_0000_1100),  // L/R output mixers
    w(4, 0b0_0101_0000),  // standard I2S, 24 bit
    w(6, 0b0_0000_0000),  // external MCLK
    w(7, 0b0_0000_0100),  // ~24kHz for internal filters
    w(14, 0b0_1000_1000), // 128x oversampling, HPF off
    w(43, 0b0_0011_0000), // mute unused paths
    w(44, 0b1_0000_0000), // disconnect microphones
    w(45, 0b1_1100_0000),
    w(46, 0b1_1100_0000),
    w(47, 0b0_0100_0000), // left line-in 0dB
    w(48, 0b0_0100_0000), // right line-in 0dB
    w(49, 0b0_0000_0011), // thermal shutdown, unused IOs to 30k
    w(50, 0b0_0001_0110), // left bypass 0dB
    w(51, 0b0_0001_0110), // right bypass 0dB
    w(52, 0b1_1011_1001), // left line-out 0dB
    w(53, 0b1_1011_1001), // right line-out 0dB
    w(54, 0b1_1100_0000), // mute speakers
    w(55, 0b1_1100_0000),
];

/// AC101 register addresses used during bring-up.
mod ac101_regs {
    pub const CHIP_AUDIO_RS: u8 = 0x00;
    pub const SYSCLK_CTRL: u8 = 0x03;
    pub const MOD_CLK_ENA: u8 = 0x04;
    pub const MOD_RST_CTRL: u8 = 0x05;
    pub const I2S_SR_CTRL: u8 = 0x06;
    pub const I2S1LCK_CTRL: u8 = 0x10;
    pub const I2S1_SDOUT_CTRL: u8 = 0x11;
    pub const I2S1_MXR_SRC: u8 = 0x13;
    pub const ADC_DIG_CTRL: u8 = 0x40;
    pub const ADC_APC_CTRL: u8 = 0x50;
    pub const ADC_SRC: u8 = 0x51;
    pub const ADC_SRCBST_CTRL: u8 = 0x52;
    pub const OMIXER_DACA_CTRL: u8 = 0x53;
    pub const OMIXER_SR: u8 = 0x54;
    pub const HPOUT_CTRL: u8 = 0x56;
}

/// AC101 codec, line-in to ADC. Values are 16 bit.
const AC101_INIT: &[Step] = &[
    w(CHIP_AUDIO_RS, 0x123), // any write resets
    Step::DelayMs(100),
    w(SYSCLK_CTRL, 0b0000_1000_0000_1000),      // sysclk from MCLK
    w(MOD_CLK_ENA, 0b1000_0000_0000_1000),      // I2S and ADC clocks
    w(MOD_RST_CTRL, 0b1000_0000_0000_1000),     // I2S and ADC out of reset
    w(I2S_SR_CTRL, 0b0100_0000_0000_0000),      // 22050 Hz
    w(I2S1LCK_CTRL, 0b1000_0000_0011_0000),     // slave, 24 bit
    w(I2S1_SDOUT_CTRL, 0b1100_0000_0000_0000),  // L/R slots on
    w(I2S1_MXR_SRC, 0b0010_0010_0000_0000),     // ADC L/R to I2S
    w(ADC_SRCBST_CTRL, 0b0000_0000_0000_0100),  // boosts muted
    w(OMIXER_SR, 0b0000_0100_0000_1000),        // line L/R to output mixer
    w(ADC_SRC, 0b0000_0100_0000_1000),          // line L/R to ADC
    w(ADC_DIG_CTRL, 0b1000_0000_0000_0000),     // ADC on
    w(ADC_APC_CTRL, 0b1011_1001_0000_0000),     // ADC L/R on, 0dB
    w(OMIXER_DACA_CTRL, 0b0011_1111_1000_0000), // analog output mixer on
    w(HPOUT_CTRL, 0b1111_1011_1111_0001),       // headphone from mixer
];

/// Supported control-bus front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecModel {
    Es7243,
    Es8388,
    Es8311,
    Wm8978,
    Ac101,
}

impl CodecModel {
    /// Codec behind an input kind (`None` for plain microphones and ADC).
    pub fn from_kind(kind: InputKind) -> Option<Self> {
        match kind {
            InputKind::Es7243 => Some(Self::Es7243),
            InputKind::Es8388 => Some(Self::Es8388),
            InputKind::Es8311 => Some(Self::Es8311),
            InputKind::Wm8978 => Some(Self::Wm8978),
            InputKind::Ac101 => Some(Self::Ac101),
            InputKind::Generic | InputKind::Sph0645 | InputKind::Adc => None,
        }
    }

    /// 7-bit I2C address.
    pub const fn address(self) -> u8 {
        match self {
            Self::Es7243 => 0x13,
            Self::Es8388 => 0x10,
            Self::Es8311 => 0x18,
            Self::Wm8978 | Self::Ac101 => 0x1A,
        }
    }

    /// Bus clock the chip is programmed at.
    pub const fn bus_speed_hz(self) -> u32 {
        match self {
            Self::Es7243 | Self::Es8388 | Self::Es8311 => 100_000,
            Self::Wm8978 | Self::Ac101 => 400_000,
        }
    }

    /// I2S slot the chip delivers its ADC data in.
    pub const fn channel_format(self) -> ChannelFormat {
        match self {
            Self::Es7243 => ChannelFormat::OnlyRight,
            Self::Es8388 | Self::Es8311 | Self::Wm8978 | Self::Ac101 => ChannelFormat::OnlyLeft,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Es7243 => "ES7243",
            Self::Es8388 => "ES8388",
            Self::Es8311 => "ES8311",
            Self::Wm8978 => "WM8978",
            Self::Ac101 => "AC101",
        }
    }

    /// Register sequence sent before capture starts.
    pub fn init_sequence(self) -> &'static [Step] {
        match self {
            Self::Es7243 => ES7243_INIT,
            Self::Es8388 => ES8388_INIT,
            Self::Es8311 => ES8311_INIT,
            Self::Wm8978 => WM8978_INIT,
            Self::Ac101 => AC101_INIT,
        }
    }

    /// Bytes on the wire for one register write.
    ///
    /// - ES parts: `[reg, val]`
    /// - WM8978: 7-bit register and 9-bit value packed into two bytes
    /// - AC101: `[reg, val_hi, val_lo]`
    pub fn encode(self, reg: u8, val: u16) -> ([u8; 3], usize) {
        match self {
            Self::Es7243 | Self::Es8388 | Self::Es8311 => ([reg, val as u8, 0], 2),
            Self::Wm8978 => ([(reg << 1) | ((val >> 8) & 0x01) as u8, val as u8, 0], 2),
            Self::Ac101 => ([reg, (val >> 8) as u8, val as u8], 3),
        }
    }

    /// Send the bring-up sequence.
    ///
    /// Never fails: unacknowledged writes are logged and counted in the
    /// report, the remaining steps are still sent.
    pub fn program<I: I2c, D: DelayNs>(self, i2c: &mut I, delay: &mut D) -> BringUpReport {
        let addr = self.address();
        let mut report = BringUpReport::default();

        for step in self.init_sequence() {
            match *step {
                Step::Write { reg, val } => {
                    let (buf, len) = self.encode(reg, val);
                    report.writes += 1;
                    if i2c.write(addr, &buf[..len]).is_err() {
                        let err = BusError::Nack { addr, reg };
                        crate::ar_warn!("{}: {} (val 0x{:X})", self.name(), err, val);
                        report.failures += 1;
                        report.first_failure.get_or_insert(err);
                    }
                }
                Step::DelayMs(ms) => delay.delay_ms(ms),
            }
        }

        if report.failures == 0 {
            crate::ar_debug!("{}: {} registers written", self.name(), report.writes);
        }
        report
    }
}

/// Outcome of [`CodecModel::program`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BringUpReport {
    /// Register writes attempted
    pub writes: u16,
    /// Writes the device did not acknowledge
    pub failures: u16,
    pub first_failure: Option<BusError>,
}

impl BringUpReport {
    pub fn all_acked(&self) -> bool {
        self.failures == 0
    }
}

/// Progress of a codec-backed source through initialize.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BringUpState {
    /// Nothing done yet (or deinitialized)
    Unconfigured = 0,
    /// Control bus lines joined
    BusJoined = 1,
    /// Register sequence sent (acks not required)
    DeviceProgrammed = 2,
    /// I2S receiver running
    CaptureStarted = 3,
}
