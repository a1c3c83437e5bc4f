//! Our error types for the PMBus sequences.

use core::num::ParseIntError;

use embedded_hal::i2c::ErrorKind;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, StepError>;

/// Why a single step of a sequence did not succeed.
///
/// Step errors never escape the [`Engine`](crate::engine::Engine); they are
/// recorded in the step's [`StepResult`](crate::engine::StepResult).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepError {
    /// The bus transaction was not acknowledged, timed out or lost arbitration.
    #[error("bus transaction failed: {0:?}")]
    Transport(ErrorKind),
    /// The device answered, but not in the shape the register expects.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// The identification register holds something other than this family's ID.
    #[error("unexpected device id {found:#X}, expected {expected:#X}")]
    UnexpectedDevice { expected: u32, found: u32 },
    /// Read-back after a write differs from the value written.
    #[error("read back {found:#X} after writing {expected:#X}")]
    VerificationMismatch { expected: u32, found: u32 },
    /// The write was acknowledged but reading it back failed.
    #[error("write acknowledged, read back failed: {0:?}")]
    ReadBack(ErrorKind),
    /// The controller refuses any further configuration writes.
    #[error("no configuration write attempts remaining")]
    AttemptsExhausted,
    /// NVM and attempt counter steps need the ICC_MAX write to have landed first.
    #[error("ICC_MAX has not been written in this sequence")]
    IccMaxNotWritten,
}

impl StepError {
    /// Whether a fatal step failing this way ends the sequence.
    ///
    /// An unverified write and a refused NVM step leave the rest of the sequence to run, so
    /// locks opened earlier are closed again.
    pub fn aborts(&self) -> bool {
        !matches!(
            self,
            StepError::VerificationMismatch { .. }
                | StepError::ReadBack(_)
                | StepError::IccMaxNotWritten
        )
    }
}

impl From<ErrorKind> for StepError {
    fn from(kind: ErrorKind) -> Self {
        StepError::Transport(kind)
    }
}

/// Register codec failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatError {
    #[error("expected {expected} reply bytes, got {found}")]
    Length { expected: usize, found: usize },
    #[error("block byte count is {found}, expected {expected}")]
    BlockCount { expected: u8, found: u8 },
    #[error("value {0:#X} does not fit the register")]
    Range(u32),
}

/// Parsing a 7-bit target address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("error parsing addr: {0}")]
    Parse(#[from] ParseIntError),
    #[error("addr {0:#04X} out of range (0x08 - 0x77)")]
    OutOfRange(u8),
}
