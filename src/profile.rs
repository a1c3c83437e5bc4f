//! Static description of how each controller family is modified.
//!
//! A [`DeviceProfile`] is plain data: the registers a family uses and the ordered [`Step`]s that
//! raise its ICC_MAX. The [`Engine`](crate::engine::Engine) only walks these lists, so supporting
//! another controller means adding a profile here.

use fugit::MillisDurationU32;

use crate::{
    registers::{PmbusCommand, Register, mps, primarion, ti},
    types::{ChipFamily, LockDomain},
};

/// ICC_MAX every profile writes: 255A.
pub const ICC_MAX_TARGET: u32 = 0xFF;

/// Time the controllers need after an NVM store before they answer again.
const NVM_SETTLE: MillisDurationU32 = MillisDurationU32::from_ticks(1000);

/// What a step does with its register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Read the register and require it to hold this identity.
    Identify(u32),
    /// Read the register.
    Read,
    /// Write a value.
    Write(u32),
    /// Write a value, read it back and compare.
    WriteVerify(u32),
    /// Write a password to open a lock.
    Unlock(LockDomain, u32),
    /// Write the value that closes a lock again.
    Relock(LockDomain, u32),
    /// Send-byte store of the configuration into NVM.
    NvmCommit,
    /// Read the remaining configuration write attempts.
    AttemptCounter,
}

/// A single protocol action against one register.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub kind: StepKind,
    pub register: Register,
    /// A failed fatal step ends the sequence for that address.
    pub fatal: bool,
    /// Wait after the transaction.
    pub settle: Option<MillisDurationU32>,
}

impl Step {
    const fn new(kind: StepKind, register: Register) -> Self {
        Self {
            kind,
            register,
            fatal: true,
            settle: None,
        }
    }

    pub const fn identify(register: Register, id: u32) -> Self {
        Self::new(StepKind::Identify(id), register)
    }

    pub const fn read(register: Register) -> Self {
        Self::new(StepKind::Read, register)
    }

    pub const fn write(register: Register, value: u32) -> Self {
        Self::new(StepKind::Write(value), register)
    }

    pub const fn write_verify(register: Register, value: u32) -> Self {
        Self::new(StepKind::WriteVerify(value), register)
    }

    pub const fn unlock(domain: LockDomain, register: Register, key: u32) -> Self {
        Self::new(StepKind::Unlock(domain, key), register)
    }

    pub const fn relock(domain: LockDomain, register: Register, value: u32) -> Self {
        Self::new(StepKind::Relock(domain, value), register)
    }

    pub const fn nvm_commit(register: Register) -> Self {
        Self::new(StepKind::NvmCommit, register)
    }

    pub const fn attempt_counter(register: Register) -> Self {
        Self::new(StepKind::AttemptCounter, register)
    }

    /// Failure is recorded but the sequence carries on.
    pub const fn non_fatal(mut self) -> Self {
        self.fatal = false;
        self
    }

    pub const fn settle(mut self, delay: MillisDurationU32) -> Self {
        self.settle = Some(delay);
        self
    }

    /// Whether this step puts data on the bus besides a page select.
    pub fn writes(&self) -> bool {
        matches!(
            self.kind,
            StepKind::Write(_)
                | StepKind::WriteVerify(_)
                | StepKind::Unlock(..)
                | StepKind::Relock(..)
                | StepKind::NvmCommit
        )
    }

    pub fn is_relock(&self) -> bool {
        matches!(self.kind, StepKind::Relock(..))
    }
}

/// Registers a family uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegisterMap {
    /// Last identification register checked.
    pub device_id: Register,
    /// Command used to switch register banks.
    pub page_select: u8,
    pub icc_max: Register,
    pub smb_password: Option<Register>,
    pub nvm_password: Option<Register>,
    pub nvm_commit: Option<Register>,
    pub attempt_counter: Option<Register>,
}

/// Everything needed to modify one controller family.
#[derive(Debug, PartialEq)]
pub struct DeviceProfile {
    pub family: ChipFamily,
    pub registers: RegisterMap,
    /// Value written into ICC_MAX.
    pub icc_max_target: u32,
    pub steps: &'static [Step],
}

impl DeviceProfile {
    /// Whether `step` is the write of the primary ICC_MAX register.
    pub fn is_icc_max_write(&self, step: &Step) -> bool {
        step.register == self.registers.icc_max
            && matches!(step.kind, StepKind::Write(_) | StepKind::WriteVerify(_))
    }

    /// Whether `step` reads the current ICC_MAX.
    pub fn is_icc_max_read(&self, step: &Step) -> bool {
        step.register == self.registers.icc_max && step.kind == StepKind::Read
    }

    /// The leading identification steps.
    pub fn identification(&self) -> impl Iterator<Item = &'static Step> {
        self.steps
            .iter()
            .take_while(|step| matches!(step.kind, StepKind::Identify(_)))
    }

    pub fn has_nvm_commit(&self) -> bool {
        self.registers.nvm_commit.is_some()
    }

    pub fn has_attempt_counter(&self) -> bool {
        self.registers.attempt_counter.is_some()
    }
}

impl ChipFamily {
    /// The profile used to modify this family.
    pub fn profile(&self) -> &'static DeviceProfile {
        match self {
            ChipFamily::Pxe1610c => &PXE1610C,
            ChipFamily::Mp2955a => &MP2955A,
            ChipFamily::Tps53678 => &TPS53678,
            ChipFamily::Tps53679 => &TPS53679,
        }
    }
}

pub static PXE1610C: DeviceProfile = DeviceProfile {
    family: ChipFamily::Pxe1610c,
    registers: RegisterMap {
        device_id: primarion::DEVICE_ID,
        page_select: PmbusCommand::Page as u8,
        icc_max: primarion::ICC_MAX,
        smb_password: Some(primarion::SMB_PASSWORD),
        nvm_password: Some(primarion::NVM_PASSWORD),
        nvm_commit: Some(primarion::UPLOAD_CONFIG),
        attempt_counter: Some(primarion::ATTEMPT_COUNTER),
    },
    icc_max_target: ICC_MAX_TARGET,
    steps: &[
        Step::identify(primarion::FAMILY_CODE, 0xB3),
        Step::identify(primarion::FAMILY_REVISION, 0x00),
        Step::identify(primarion::DEVICE_ID, 0x0415),
        Step::unlock(
            LockDomain::Smb,
            primarion::SMB_PASSWORD,
            primarion::SMB_PASSWORD_KEY,
        ),
        Step::read(primarion::ICC_MAX),
        Step::write(primarion::ICC_MAX, ICC_MAX_TARGET),
        // At zero the upload below is refused.
        Step::attempt_counter(primarion::ATTEMPT_COUNTER).non_fatal(),
        Step::unlock(
            LockDomain::Nvm,
            primarion::NVM_PASSWORD,
            primarion::NVM_PASSWORD_KEY,
        ),
        // The upload outcome only shows in the attempt counter afterwards.
        Step::nvm_commit(primarion::UPLOAD_CONFIG)
            .non_fatal()
            .settle(NVM_SETTLE),
        Step::relock(LockDomain::Nvm, primarion::NVM_PASSWORD, primarion::NVM_LOCKED).non_fatal(),
        Step::attempt_counter(primarion::ATTEMPT_COUNTER).non_fatal(),
    ],
};

pub static MP2955A: DeviceProfile = DeviceProfile {
    family: ChipFamily::Mp2955a,
    registers: RegisterMap {
        device_id: mps::DEVICE_ID,
        page_select: PmbusCommand::Page as u8,
        icc_max: mps::ICC_MAX,
        smb_password: None,
        nvm_password: None,
        nvm_commit: Some(mps::STORE),
        attempt_counter: None,
    },
    icc_max_target: ICC_MAX_TARGET,
    steps: &[
        Step::identify(mps::DEVICE_ID, 0x2555),
        Step::read(mps::ICC_MAX),
        Step::write_verify(mps::ICC_MAX, ICC_MAX_TARGET),
        Step::nvm_commit(mps::STORE).settle(NVM_SETTLE),
    ],
};

/// Both TI parts share one sequence and differ only in their ID.
const fn ti_steps(id: u32) -> [Step; 7] {
    [
        Step::identify(ti::DEVICE_ID, id),
        Step::unlock(LockDomain::Smb, ti::WRITE_PROTECT, ti::WRITES_ENABLED),
        Step::read(ti::ICC_MAX),
        Step::write_verify(ti::ICC_MAX, ICC_MAX_TARGET),
        Step::unlock(LockDomain::Nvm, ti::WRITE_PROTECT, ti::WRITES_ENABLED),
        Step::nvm_commit(ti::STORE).settle(NVM_SETTLE),
        Step::relock(LockDomain::Nvm, ti::WRITE_PROTECT, ti::WRITES_DISABLED).non_fatal(),
    ]
}

const TI_REGISTERS: RegisterMap = RegisterMap {
    device_id: ti::DEVICE_ID,
    page_select: PmbusCommand::Page as u8,
    icc_max: ti::ICC_MAX,
    smb_password: Some(ti::WRITE_PROTECT),
    nvm_password: Some(ti::WRITE_PROTECT),
    nvm_commit: Some(ti::STORE),
    attempt_counter: None,
};

static TPS53678_STEPS: [Step; 7] = ti_steps(ti::TPS53678_ID);
static TPS53679_STEPS: [Step; 7] = ti_steps(ti::TPS53679_ID);

pub static TPS53678: DeviceProfile = DeviceProfile {
    family: ChipFamily::Tps53678,
    registers: TI_REGISTERS,
    icc_max_target: ICC_MAX_TARGET,
    steps: &TPS53678_STEPS,
};

pub static TPS53679: DeviceProfile = DeviceProfile {
    family: ChipFamily::Tps53679,
    registers: TI_REGISTERS,
    icc_max_target: ICC_MAX_TARGET,
    steps: &TPS53679_STEPS,
};
