//! Input settings stored in NVS under a versioned schema.
//!
//! Stored layout, schema v1: input kind, six optional lines (WS, SD, SCK,
//! MCLK, SDA, SCL), sample scale as raw f32 bits, sample rate, I2S role.
//!
//! A later layout bumps [`CURRENT_SCHEMA_VERSION`], adds a migration arm to
//! [`classify_schema`] and writes its extra keys next to the v1 ones.

use core::cmp::Ordering;

use super::InputSettings;
use crate::hal::gpio::GpioNum;

#[cfg(target_os = "espidf")]
use super::{CapturePins, InputKind};

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::*;
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::EspError;

/// Current NVS schema version for input settings
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// NVS namespace for audio input settings
pub const NVS_NAMESPACE: &str = "ar_input";

/// NVS keys (max 15 chars)
pub mod nvs_keys {
    pub const VERSION: &str = "schema_ver";
    pub const KIND: &str = "kind";
    pub const PIN_WS: &str = "pin_ws";
    pub const PIN_SD: &str = "pin_sd";
    pub const PIN_SCK: &str = "pin_sck";
    pub const PIN_MCLK: &str = "pin_mclk";
    pub const PIN_SDA: &str = "pin_sda";
    pub const PIN_SCL: &str = "pin_scl";
    pub const SCALE: &str = "scale_bits";
    pub const RATE: &str = "rate";
    pub const MASTER: &str = "master";
}

/// What a load found in flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationResult {
    /// Nothing stored yet, defaults returned
    FreshInstall,
    /// Stored with the current layout
    UpToDate,
}

#[derive(Debug, thiserror::Error)]
pub enum NvsError {
    #[cfg(target_os = "espidf")]
    #[error("NVS open failed: {0}")]
    InitFailed(EspError),
    /// Written by a newer firmware, never downgraded
    #[error("settings schema v{stored_version} is newer than this build")]
    TooNew { stored_version: u32 },
    #[cfg(target_os = "espidf")]
    #[error("NVS access failed: {0}")]
    IoError(EspError),
    #[error("unknown input kind {0}")]
    InvalidKind(u8),
    /// Host builds have no flash
    #[cfg(not(target_os = "espidf"))]
    #[error("NVS not available on this platform")]
    NotAvailable,
}

#[cfg(target_os = "espidf")]
impl From<EspError> for NvsError {
    fn from(e: EspError) -> Self {
        NvsError::IoError(e)
    }
}

/// Decide what to do with a stored schema version (0 = nothing stored).
pub fn classify_schema(stored_version: u32) -> Result<MigrationResult, NvsError> {
    match stored_version.cmp(&CURRENT_SCHEMA_VERSION) {
        Ordering::Equal => Ok(MigrationResult::UpToDate),
        Ordering::Less => Ok(MigrationResult::FreshInstall),
        Ordering::Greater => Err(NvsError::TooNew { stored_version }),
    }
}

/// Encode an optional line for storage (-1 = unused).
#[inline]
pub fn line_to_nvs(line: Option<GpioNum>) -> i32 {
    line.map(i32::from).unwrap_or(-1)
}

/// Decode a stored line. Anything out of range means "unused".
#[inline]
pub fn line_from_nvs(raw: i32) -> Option<GpioNum> {
    u8::try_from(raw).ok()
}

/// Load input settings from NVS.
///
/// On `FreshInstall` the returned settings are the defaults.
#[cfg(target_os = "espidf")]
pub fn load_settings_from_nvs() -> Result<(InputSettings, MigrationResult), NvsError> {
    let nvs_default = EspDefaultNvsPartition::take().map_err(NvsError::InitFailed)?;
    let storage = EspNvs::new(nvs_default, NVS_NAMESPACE, true).map_err(NvsError::InitFailed)?;

    let stored_version = storage.get_u32(nvs_keys::VERSION)?.unwrap_or(0);
    match classify_schema(stored_version)? {
        MigrationResult::FreshInstall => {
            Ok((InputSettings::default(), MigrationResult::FreshInstall))
        }
        MigrationResult::UpToDate => Ok((load_v1(&storage)?, MigrationResult::UpToDate)),
    }
}

/// Host builds: always `NotAvailable`.
#[cfg(not(target_os = "espidf"))]
pub fn load_settings_from_nvs() -> Result<(InputSettings, MigrationResult), NvsError> {
    Err(NvsError::NotAvailable)
}

/// Save input settings to NVS with version stamp.
#[cfg(target_os = "espidf")]
pub fn save_settings_to_nvs(settings: &InputSettings) -> Result<(), NvsError> {
    let nvs_default = EspDefaultNvsPartition::take().map_err(NvsError::InitFailed)?;
    let mut storage =
        EspNvs::new(nvs_default, NVS_NAMESPACE, true).map_err(NvsError::InitFailed)?;

    storage.set_u32(nvs_keys::VERSION, CURRENT_SCHEMA_VERSION)?;
    save_v1(&mut storage, settings)
}

#[cfg(not(target_os = "espidf"))]
pub fn save_settings_to_nvs(_settings: &InputSettings) -> Result<(), NvsError> {
    Err(NvsError::NotAvailable)
}

#[cfg(target_os = "espidf")]
fn load_v1(storage: &EspNvs<NvsDefault>) -> Result<InputSettings, NvsError> {
    let defaults = InputSettings::default();

    let kind = match storage.get_u8(nvs_keys::KIND)? {
        Some(raw) => InputKind::from_u8(raw).ok_or(NvsError::InvalidKind(raw))?,
        None => defaults.kind,
    };
    let line = |key: &str| -> Result<Option<GpioNum>, NvsError> {
        Ok(storage.get_i32(key)?.and_then(line_from_nvs))
    };

    Ok(InputSettings {
        kind,
        pins: CapturePins {
            ws: line(nvs_keys::PIN_WS)?,
            sd: line(nvs_keys::PIN_SD)?,
            sck: line(nvs_keys::PIN_SCK)?,
            mclk: line(nvs_keys::PIN_MCLK)?,
        },
        sda: line(nvs_keys::PIN_SDA)?,
        scl: line(nvs_keys::PIN_SCL)?,
        sample_scale: storage
            .get_u32(nvs_keys::SCALE)?
            .map(f32::from_bits)
            .unwrap_or(defaults.sample_scale),
        sample_rate: storage.get_u32(nvs_keys::RATE)?.unwrap_or(defaults.sample_rate),
        i2s_master: storage
            .get_u8(nvs_keys::MASTER)?
            .map(|v| v != 0)
            .unwrap_or(defaults.i2s_master),
    })
}

#[cfg(target_os = "espidf")]
fn save_v1(storage: &mut EspNvs<NvsDefault>, s: &InputSettings) -> Result<(), NvsError> {
    storage.set_u8(nvs_keys::KIND, s.kind as u8)?;
    storage.set_i32(nvs_keys::PIN_WS, line_to_nvs(s.pins.ws))?;
    storage.set_i32(nvs_keys::PIN_SD, line_to_nvs(s.pins.sd))?;
    storage.set_i32(nvs_keys::PIN_SCK, line_to_nvs(s.pins.sck))?;
    storage.set_i32(nvs_keys::PIN_MCLK, line_to_nvs(s.pins.mclk))?;
    storage.set_i32(nvs_keys::PIN_SDA, line_to_nvs(s.sda))?;
    storage.set_i32(nvs_keys::PIN_SCL, line_to_nvs(s.scl))?;
    storage.set_u32(nvs_keys::SCALE, s.sample_scale.to_bits())?;
    storage.set_u32(nvs_keys::RATE, s.sample_rate)?;
    storage.set_u8(nvs_keys::MASTER, s.i2s_master as u8)?;
    Ok(())
}
