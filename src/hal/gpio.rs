//! Physical line (GPIO) ownership.
//!
//! Lines are a process-wide resource: every source claims the lines it
//! drives through a [`LineAllocator`] and gives back exactly those on
//! deinitialize. [`PinManager`] is the lock-free allocator used on device
//! and in tests.

use core::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::error::BusError;

/// GPIO number. "No line requested" is expressed as `Option::None`.
pub type GpioNum = u8;

/// Highest GPIO count on supported chips (ESP32-S3 has 49 pads).
pub const MAX_GPIO: usize = 49;

/// Owner tag attached to a claimed line.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOwner {
    /// Line is free
    None = 0,
    /// Audio capture (I2S / ADC)
    Audio = 1,
    /// Shared I2C control bus
    I2c = 2,
    /// LED output driver
    Leds = 3,
    /// Buttons, relays and other user I/O
    User = 4,
}

impl PinOwner {
    /// Convert from u8
    #[inline]
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Audio,
            2 => Self::I2c,
            3 => Self::Leds,
            4 => Self::User,
            _ => Self::None,
        }
    }
}

/// Why a claim was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineError {
    /// Line already owned (by anyone, including the caller)
    InUse { owner: PinOwner },
    /// Line number not available on this chip
    Invalid,
}

/// Exclusive line ownership.
///
/// Implementations must be safe to share between sources (`&self` API).
pub trait LineAllocator {
    /// Claim `line` for `owner`. Fails if the line is already owned.
    fn claim(&self, line: GpioNum, output: bool, owner: PinOwner) -> Result<(), LineError>;

    /// Release `line` if (and only if) it is owned by `owner`.
    fn release(&self, line: GpioNum, owner: PinOwner);

    /// Current owner of `line` (`PinOwner::None` if free or invalid).
    fn owner_of(&self, line: GpioNum) -> PinOwner;

    /// Join the shared I2C bus on `sda`/`scl`.
    ///
    /// Lines already owned by the bus are accepted as-is; lines owned by
    /// anything else fail the join. Returns the lines this call claimed,
    /// so a caller whose bring-up fails later can give back exactly those.
    fn join_bus(
        &self,
        sda: Option<GpioNum>,
        scl: Option<GpioNum>,
    ) -> Result<ClaimedLines, BusError> {
        let (sda, scl) = match (sda, scl) {
            (Some(sda), Some(scl)) if sda != scl => (sda, scl),
            _ => return Err(BusError::Unassigned),
        };

        let mut joined = ClaimedLines::with_owner(PinOwner::I2c);
        for line in [sda, scl] {
            if self.owner_of(line) == PinOwner::I2c {
                continue;
            }
            if joined.claim(self, line, true).is_err() {
                joined.release_all(self);
                return Err(BusError::Contended);
            }
        }
        Ok(joined)
    }
}

/// Lock-free line allocator backed by an atomic owner table.
pub struct PinManager {
    owners: [AtomicU8; MAX_GPIO],
    outputs: AtomicU64,
}

impl PinManager {
    /// Create allocator with every line free.
    pub const fn new() -> Self {
        const FREE: AtomicU8 = AtomicU8::new(PinOwner::None as u8);
        Self {
            owners: [FREE; MAX_GPIO],
            outputs: AtomicU64::new(0),
        }
    }

    /// Number of lines currently owned by anyone.
    pub fn claimed_count(&self) -> usize {
        self.owners
            .iter()
            .filter(|o| o.load(Ordering::Acquire) != PinOwner::None as u8)
            .count()
    }

    /// Number of lines currently owned by `owner`.
    pub fn claimed_by(&self, owner: PinOwner) -> usize {
        self.owners
            .iter()
            .filter(|o| o.load(Ordering::Acquire) == owner as u8)
            .count()
    }

    /// Check if a claimed line was claimed as output.
    pub fn is_output(&self, line: GpioNum) -> bool {
        (line as usize) < MAX_GPIO && self.outputs.load(Ordering::Acquire) & (1u64 << line) != 0
    }
}

impl Default for PinManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LineAllocator for PinManager {
    fn claim(&self, line: GpioNum, output: bool, owner: PinOwner) -> Result<(), LineError> {
        let slot = self.owners.get(line as usize).ok_or(LineError::Invalid)?;
        if owner == PinOwner::None {
            return Err(LineError::Invalid);
        }

        slot.compare_exchange(
            PinOwner::None as u8,
            owner as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .map_err(|current| LineError::InUse {
            owner: PinOwner::from_u8(current),
        })?;

        let bit = 1u64 << line;
        if output {
            self.outputs.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.outputs.fetch_and(!bit, Ordering::AcqRel);
        }
        Ok(())
    }

    fn release(&self, line: GpioNum, owner: PinOwner) {
        if let Some(slot) = self.owners.get(line as usize) {
            if slot
                .compare_exchange(
                    owner as u8,
                    PinOwner::None as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                self.outputs.fetch_and(!(1u64 << line), Ordering::AcqRel);
            }
        }
    }

    fn owner_of(&self, line: GpioNum) -> PinOwner {
        self.owners
            .get(line as usize)
            .map(|o| PinOwner::from_u8(o.load(Ordering::Acquire)))
            .unwrap_or(PinOwner::None)
    }
}

/// Maximum lines a single source claims (WS, SD, SCK, MCLK).
pub const MAX_SOURCE_LINES: usize = 4;

/// Lines claimed by one owner, released together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimedLines {
    owner: PinOwner,
    lines: [Option<GpioNum>; MAX_SOURCE_LINES],
}

impl ClaimedLines {
    /// Empty set of audio lines.
    pub const fn new() -> Self {
        Self::with_owner(PinOwner::Audio)
    }

    pub const fn with_owner(owner: PinOwner) -> Self {
        Self {
            owner,
            lines: [None; MAX_SOURCE_LINES],
        }
    }

    pub fn owner(&self) -> PinOwner {
        self.owner
    }

    /// Claim `line` for this set's owner and remember it.
    pub fn claim<L: LineAllocator + ?Sized>(
        &mut self,
        alloc: &L,
        line: GpioNum,
        output: bool,
    ) -> Result<(), LineError> {
        let free = self
            .lines
            .iter_mut()
            .find(|l| l.is_none())
            .ok_or(LineError::Invalid)?;
        alloc.claim(line, output, self.owner)?;
        *free = Some(line);
        Ok(())
    }

    /// Release every remembered line. Safe to call repeatedly.
    pub fn release_all<L: LineAllocator + ?Sized>(&mut self, alloc: &L) {
        for slot in self.lines.iter_mut() {
            if let Some(line) = slot.take() {
                alloc.release(line, self.owner);
            }
        }
    }

    /// Number of lines currently held.
    pub fn len(&self) -> usize {
        self.lines.iter().filter(|l| l.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, line: GpioNum) -> bool {
        self.lines.contains(&Some(line))
    }
}

impl Default for ClaimedLines {
    fn default() -> Self {
        Self::new()
    }
}
