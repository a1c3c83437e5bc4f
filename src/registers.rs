//! This module is used to define the PMBus commands and the vendor registers of the supported controllers.
//!
//! Registers on banked controllers are addressed by `(page, command)`. A page of `None` means the
//! command is issued without selecting a page first.

/// Standard PMBus commands shared by every family.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum PmbusCommand {
    /// __W__ - Select the page (register bank) used by all following commands.
    Page = 0x00,
    /// __R/W__ - Write protection level.
    /// * `0x00` - Writes to all commands enabled.
    /// * `0x80` - Writes to all commands except `WRITE_PROTECT` disabled.
    WriteProtect = 0x10,
    /// __Send byte__ - Store the operating memory into the default NVM store.
    StoreDefaultAll = 0x11,
    /// __Send byte__ - Store the operating memory into the user NVM store.
    StoreUserAll = 0x15,
    /// __Block R__ - Controller device identifier.
    IcDeviceId = 0xAD,
}

impl From<PmbusCommand> for u8 {
    fn from(value: PmbusCommand) -> Self {
        value as u8
    }
}

/// Shape of the data phase following the command byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Format {
    /// No data phase, the command byte alone is the action.
    SendByte,
    /// One data byte.
    Byte,
    /// Two data bytes, little endian.
    Word,
    /// SMBus block: a byte count followed by that many data bytes, little endian.
    ///
    /// Only counts of 1 - 4 fit a register value.
    Block(u8),
}

impl Format {
    /// Largest reply any format can produce (block count byte + 4 data bytes).
    pub const MAX_REPLY: usize = 5;

    /// Number of bytes a read of this register returns.
    pub const fn reply_len(&self) -> usize {
        match self {
            Format::SendByte => 0,
            Format::Byte => 1,
            Format::Word => 2,
            Format::Block(count) => *count as usize + 1,
        }
    }
}

/// A command on a page.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Register {
    pub page: Option<u8>,
    pub command: u8,
    pub format: Format,
}

impl Register {
    /// A register that needs `page` selected before access.
    pub const fn banked(page: u8, command: u8, format: Format) -> Self {
        Self {
            page: Some(page),
            command,
            format,
        }
    }

    /// A register accessed without a page select.
    pub const fn unbanked(command: u8, format: Format) -> Self {
        Self {
            page: None,
            command,
            format,
        }
    }
}

/// Infineon / Primarion PXE1610C.
///
/// Pages `0x20` - `0x50` are the vendor configuration space, not output rails.
pub mod primarion {
    use super::{Format, Register};

    /// __R__ - Vendor family code, `0xB3` on Primarion parts.
    pub const FAMILY_CODE: Register = Register::banked(0x00, 0xFD, Format::Byte);
    /// __R__ - Family revision, `0x00` on the PXE16xx generation.
    pub const FAMILY_REVISION: Register = Register::banked(0x4F, 0x1A, Format::Byte);
    /// __R__ - Device ID, `15 04` on the wire for a PXE1610C.
    pub const DEVICE_ID: Register = Register::banked(0x4F, 0x32, Format::Word);
    /// __W__ - SMBus configuration password.
    pub const SMB_PASSWORD: Register = Register::banked(0x3F, 0x27, Format::Word);
    /// __W__ - NVM password. Writing `0x0000` locks NVM again.
    pub const NVM_PASSWORD: Register = Register::banked(0x3F, 0x29, Format::Word);
    /// __Send byte__ - Upload the configuration into NVM.
    pub const UPLOAD_CONFIG: Register = Register::banked(0x3F, 0x34, Format::SendByte);
    /// __R/W__ - ICC_MAX in amps.
    pub const ICC_MAX: Register = Register::banked(0x20, 0x73, Format::Word);
    /// __R__ - Remaining NVM write attempts.
    ///
    /// See [`AttemptCounter`](crate::types::AttemptCounter) for the bit layout.
    pub const ATTEMPT_COUNTER: Register = Register::banked(0x50, 0x82, Format::Word);

    pub const SMB_PASSWORD_KEY: u32 = 0xB37C;
    pub const NVM_PASSWORD_KEY: u32 = 0xEFD7;
    pub const NVM_LOCKED: u32 = 0x0000;
}

/// Monolithic Power Systems MP2955A.
pub mod mps {
    use super::{Format, PmbusCommand, Register};

    /// __R__ - Device ID, `55 25` on the wire.
    pub const DEVICE_ID: Register = Register::banked(0x00, 0xBF, Format::Word);
    /// __R/W__ - ICC_MAX in amps.
    pub const ICC_MAX: Register = Register::banked(0x00, 0xEF, Format::Byte);
    /// __Send byte__ - `STORE_USER_ALL`.
    pub const STORE: Register =
        Register::banked(0x00, PmbusCommand::StoreUserAll as u8, Format::SendByte);
}

/// Texas Instruments TPS53678 / TPS53679.
pub mod ti {
    use super::{Format, PmbusCommand, Register};

    /// __R__ - `IC_DEVICE_ID`, a one byte block.
    pub const DEVICE_ID: Register =
        Register::banked(0x00, PmbusCommand::IcDeviceId as u8, Format::Block(1));
    /// __R/W__ - `WRITE_PROTECT`, the only lock these controllers have.
    pub const WRITE_PROTECT: Register =
        Register::banked(0x00, PmbusCommand::WriteProtect as u8, Format::Byte);
    /// __R/W__ - ICC_MAX in amps.
    pub const ICC_MAX: Register = Register::banked(0x00, 0xDA, Format::Word);
    /// __Send byte__ - `STORE_DEFAULT_ALL`.
    pub const STORE: Register =
        Register::banked(0x00, PmbusCommand::StoreDefaultAll as u8, Format::SendByte);

    pub const TPS53678_ID: u32 = 0x78;
    pub const TPS53679_ID: u32 = 0x79;
    pub const WRITES_ENABLED: u32 = 0x00;
    pub const WRITES_DISABLED: u32 = 0x80;
}

/// Renesas / Intersil ISL69127. Only recognised by the scan, there is no sequence for it.
pub mod isl {
    use super::{Format, PmbusCommand, Register};

    pub const DEVICE_ID: Register =
        Register::banked(0x00, PmbusCommand::IcDeviceId as u8, Format::Block(4));
    /// `00 23 D2 49` on the wire.
    pub const ISL69127_ID: u32 = 0x49D2_2300;
}
