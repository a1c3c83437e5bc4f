//! This module contains the types the sequences are expressed in.

use core::{fmt, str::FromStr};

use modular_bitfield::prelude::*;
use strum_macros::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

use crate::error::AddressError;

/// All supported controller families.
///
/// The string form is the name used on the command line and in status lines.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, EnumCount, IntoStaticStr,
)]
pub enum ChipFamily {
    /// Infineon / Primarion PXE1610C.
    #[strum(serialize = "PXE1610C")]
    Pxe1610c,
    /// Monolithic Power Systems MP2955A.
    #[strum(serialize = "MP2955A")]
    Mp2955a,
    /// Texas Instruments TPS53678.
    #[strum(serialize = "TPS53678")]
    Tps53678,
    /// Texas Instruments TPS53679.
    #[strum(serialize = "TPS53679")]
    Tps53679,
}

impl ChipFamily {
    /// Vendor line the family belongs to.
    pub fn vendor(&self) -> &'static str {
        match self {
            ChipFamily::Pxe1610c => "Primarion",
            ChipFamily::Mp2955a => "MPS",
            ChipFamily::Tps53678 | ChipFamily::Tps53679 => "TI",
        }
    }
}

/// A 7-bit bus address of one controller.
///
/// Only the non-reserved range `0x08` - `0x77` is accepted. Addresses are never shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetAddress(u8);

impl TargetAddress {
    pub const MIN: u8 = 0x08;
    pub const MAX: u8 = 0x77;

    pub fn new(address: u8) -> Result<Self, AddressError> {
        if (Self::MIN..=Self::MAX).contains(&address) {
            Ok(Self(address))
        } else {
            Err(AddressError::OutOfRange(address))
        }
    }

    /// The raw 7-bit address.
    pub fn get(&self) -> u8 {
        self.0
    }

    /// Every address from `self` to `end`, inclusive.
    pub fn through(self, end: TargetAddress) -> impl Iterator<Item = TargetAddress> {
        (self.0..=end.0).map(TargetAddress)
    }
}

/// Parses hex as typed on the command line, `5A` or `0x5A`.
impl FromStr for TargetAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let address = u8::from_str_radix(digits, 16)?;
        Self::new(address)
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.0)
    }
}

/// Which password protected domain a lock step acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDomain {
    /// Register writes over SMBus.
    Smb,
    /// Writes into non-volatile memory.
    Nvm,
}

impl LockDomain {
    /// Name used in status lines.
    pub fn password_name(&self) -> &'static str {
        match self {
            LockDomain::Smb => "smb_password",
            LockDomain::Nvm => "nvm_password",
        }
    }
}

/// Primarion attempt counter register, read as a little endian word.
///
/// Bits 6 - 13 hold the number of NVM uploads the controller will still accept.
#[bitfield]
#[derive(Clone, Copy)]
pub struct AttemptCounter {
    #[skip]
    __: B6,
    pub remaining: B8,
    #[skip]
    __: B2,
}

impl AttemptCounter {
    /// Controller refuses uploads at this count.
    pub const EXHAUSTED: u8 = 0;

    pub fn from_word(word: u16) -> Self {
        Self::from_bytes(word.to_le_bytes())
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == Self::EXHAUSTED
    }
}
