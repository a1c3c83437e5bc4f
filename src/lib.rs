//! This crate raises the ICC_MAX current limit of VRM controllers over PMBus (SMBus / I2C).
//!
//! It supports `no-std` environments by use of the `no_std` feature flag. The bus is anything
//! implementing [`embedded_hal::i2c::I2c`].
//!
//! Supported controllers:
//! * Infineon / Primarion PXE1610C
//! * MPS MP2955A
//! * TI TPS53678
//! * TI TPS53679
//!
//! Every controller is described by a [`DeviceProfile`]: the registers it uses and an ordered
//! list of [`Step`](profile::Step)s. The [`Engine`] walks that list against one address,
//! emitting [`Event`]s to a [`Reporter`] as it goes, and returns a [`SequenceResult`].
//!
//! ```ignore
//! let mut engine = Engine::new(i2c, delay);
//! let mut lines = StatusLines::new(console);
//! let result = engine.run(ChipFamily::Pxe1610c.profile(), "5A".parse()?, &mut lines);
//! assert!(result.success());
//! ```
//!
//! Writes to a PXE1610C consume one of a small number of hardware configuration attempts.
//! The remaining count is checked before the upload and reported again after it.
//!
//! @TODO support LINEAR11 encoded ICC_MAX registers once a profile needs one.

#![cfg_attr(all(feature = "no_std", not(test)), no_std)]

pub mod codec;
pub mod engine;
pub mod error;
pub mod profile;
pub mod registers;
pub mod report;
pub mod types;

#[cfg(test)]
mod mock_bus;

pub use engine::{Engine, EngineConfig, Identity, Probe, SequenceResult, Session};
pub use error::{AddressError, StepError};
pub use profile::DeviceProfile;
pub use report::{Event, Reporter, StatusLines};
pub use types::{ChipFamily, TargetAddress};
