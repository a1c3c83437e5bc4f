//! The sequence engine.
//!
//! [`Engine`] owns the bus and walks a [`DeviceProfile`]'s steps against one address at a time.
//! It knows nothing about individual families; every quirk lives in the profile.

use embedded_hal::{
    delay::DelayNs,
    i2c::{Error as _, ErrorKind, I2c},
};
use log::{debug, error, info, warn};

use crate::{
    codec::{self, HexBytes, WireValue},
    error::{FormatError, Result, StepError},
    profile::{DeviceProfile, Step, StepKind},
    registers::{Format, PmbusCommand, Register, isl},
    report::{Event, Reporter},
    types::{AttemptCounter, ChipFamily, TargetAddress},
};

/// Most steps a profile may have.
pub const MAX_STEPS: usize = 16;
/// Most addresses one invocation modifies.
pub const MAX_TARGETS: usize = 2;

/// Order the scan tries identities in.
pub const SCAN_ORDER: [ChipFamily; 4] = [
    ChipFamily::Tps53679,
    ChipFamily::Tps53678,
    ChipFamily::Mp2955a,
    ChipFamily::Pxe1610c,
];

/// One byte read of `PAGE`, answered by anything on the bus.
const PRESENCE: Register = Register::unbanked(PmbusCommand::Page as u8, Format::Byte);

/// Command byte plus the largest data phase.
const MAX_FRAME: usize = codec::MAX_PAYLOAD + 1;

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Attempts per transaction while running a sequence.
    pub retries: u8,
    /// Attempts per transaction while scanning.
    pub scan_retries: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retries: 4,
            scan_retries: 2,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attempts per sequence transaction. At least one attempt is always made.
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries.max(1);
        self
    }

    /// Set the attempts per scan transaction. At least one attempt is always made.
    pub fn with_scan_retries(mut self, retries: u8) -> Self {
        self.scan_retries = retries.max(1);
        self
    }
}

/// What a successful step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// The write was acknowledged.
    Ack,
    /// Value read, or read back after a verified write.
    Value(u32),
    /// Remaining configuration write attempts.
    Remaining(u8),
    /// ICC_MAX already holds the target, nothing needs writing.
    AlreadySet(u32),
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Position in the profile's step list.
    pub index: usize,
    pub step: Step,
    pub outcome: Result<Reply>,
}

/// Everything that happened on one address.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceResult {
    pub profile: &'static DeviceProfile,
    pub address: TargetAddress,
    /// Executed steps, in order. Steps after an abort are absent.
    pub steps: heapless::Vec<StepResult, MAX_STEPS>,
    /// The sequence stopped early because ICC_MAX was already at target.
    pub skipped: bool,
}

impl SequenceResult {
    fn new(profile: &'static DeviceProfile, address: TargetAddress) -> Self {
        Self {
            profile,
            address,
            steps: heapless::Vec::new(),
            skipped: false,
        }
    }

    /// Every fatal step that ran succeeded, and at least one ran.
    pub fn success(&self) -> bool {
        !self.steps.is_empty()
            && self
                .steps
                .iter()
                .all(|result| !result.step.fatal || result.outcome.is_ok())
    }

    /// Nothing acknowledged the first transaction.
    pub fn device_absent(&self) -> bool {
        matches!(
            self.steps.first(),
            Some(StepResult {
                outcome: Err(StepError::Transport(ErrorKind::NoAcknowledge(_))),
                ..
            })
        )
    }

    /// Remaining configuration write attempts at the last counter read, if any.
    pub fn remaining_attempts(&self) -> Option<u8> {
        self.steps.iter().rev().find_map(|result| match result.outcome {
            Ok(Reply::Remaining(remaining)) => Some(remaining),
            Err(StepError::AttemptsExhausted) => Some(AttemptCounter::EXHAUSTED),
            _ => None,
        })
    }
}

/// Results of one family run over every requested address.
#[derive(Debug, Default)]
pub struct Session {
    pub results: heapless::Vec<SequenceResult, MAX_TARGETS>,
}

impl Session {
    /// Every address was modified, or already at target.
    pub fn success(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(SequenceResult::success)
    }
}

/// What a scan made of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// Every identification step of the family matched.
    Family(ChipFamily),
    /// The vendor level identification matched, the device ID did not.
    Partial(ChipFamily),
    /// Renesas / Intersil ISL69127, which has no sequence.
    Isl69127,
    Unknown,
}

/// A device that answered during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub address: TargetAddress,
    pub identity: Identity,
    pub remaining_attempts: Option<u8>,
    /// Raw ICC_MAX register value.
    pub icc_max: Option<u32>,
}

/// State scoped to one sequence execution.
#[derive(Debug, Default)]
struct RunState {
    icc_max_written: bool,
    /// An NVM store was accepted.
    committed: bool,
    exhausted: bool,
}

impl RunState {
    fn require_icc_max(&self) -> Result<()> {
        if self.icc_max_written {
            Ok(())
        } else {
            Err(StepError::IccMaxNotWritten)
        }
    }
}

/// Runs device profiles over an I2C bus.
pub struct Engine<I, D> {
    bus: I,
    delay: D,
    config: EngineConfig,
    /// Page last selected on the current address, `None` when unknown.
    page: Option<u8>,
    /// Command byte used to select pages.
    page_select: u8,
}

impl<I: I2c, D: DelayNs> Engine<I, D> {
    pub fn new(bus: I, delay: D) -> Self {
        Self::with_config(bus, delay, EngineConfig::default())
    }

    pub fn with_config(bus: I, delay: D, config: EngineConfig) -> Self {
        Self {
            bus,
            delay,
            config,
            page: None,
            page_select: PmbusCommand::Page.into(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Give back the bus and delay.
    pub fn release(self) -> (I, D) {
        (self.bus, self.delay)
    }

    /// Execute `profile` against `address`.
    ///
    /// Step failures never escape; they are recorded in the returned result and reported as
    /// they happen.
    pub fn run(
        &mut self,
        profile: &'static DeviceProfile,
        address: TargetAddress,
        reporter: &mut impl Reporter,
    ) -> SequenceResult {
        self.page = None;
        self.page_select = profile.registers.page_select;
        let mut state = RunState::default();
        let mut result = SequenceResult::new(profile, address);
        let identification = profile.identification().count();

        debug!("{address}: running {} sequence", profile.family);
        reporter.report(Event::Begin { profile, address });

        for (index, step) in profile.steps.iter().enumerate() {
            reporter.report(Event::StepStarted { profile, step });

            let outcome = self.execute(profile, address, step, &mut state);
            if let Some(settle) = step.settle {
                if !matches!(
                    outcome,
                    Err(StepError::IccMaxNotWritten | StepError::AttemptsExhausted)
                ) {
                    self.delay.delay_ms(settle.to_millis());
                }
            }

            let aborts = step.fatal && outcome.as_ref().is_err_and(StepError::aborts);
            let skipped = matches!(outcome, Ok(Reply::AlreadySet(_)));
            let identified = index + 1 == identification && outcome.is_ok();

            let step_result = StepResult {
                index,
                step: *step,
                outcome,
            };
            reporter.report(Event::StepFinished {
                profile,
                result: &step_result,
            });
            if result.steps.push(step_result).is_err() {
                warn!("{address}: {} has more than {MAX_STEPS} steps", profile.family);
                break;
            }

            if identified {
                reporter.report(Event::Identified { profile, address });
            }
            if skipped {
                info!("{address}: ICC_MAX already at target");
                result.skipped = true;
                break;
            }
            if aborts {
                debug!("{address}: step {index} failed, aborting");
                break;
            }
        }

        reporter.report(Event::Finished { result: &result });
        result
    }

    /// Run `family` on each address in turn, independently.
    pub fn run_targets(
        &mut self,
        family: ChipFamily,
        targets: &[TargetAddress],
        reporter: &mut impl Reporter,
    ) -> Session {
        let profile = family.profile();
        let mut session = Session::default();
        for &address in targets.iter().take(MAX_TARGETS) {
            let result = self.run(profile, address, &mut *reporter);
            if session.results.push(result).is_err() {
                break;
            }
        }
        session
    }

    /// Probe every address from `start` to `end`, returning how many answered.
    pub fn scan(
        &mut self,
        start: TargetAddress,
        end: TargetAddress,
        reporter: &mut impl Reporter,
    ) -> usize {
        let mut found = 0;
        for address in start.through(end) {
            reporter.report(Event::Scanning { address });
            if let Some(probe) = self.probe(address) {
                found += 1;
                reporter.report(Event::Probed { probe: &probe });
            }
        }
        found
    }

    /// Find out what sits at `address` without writing anything besides page selects.
    ///
    /// `None` when nothing acknowledges.
    pub fn probe(&mut self, address: TargetAddress) -> Option<Probe> {
        self.page = None;
        self.page_select = PmbusCommand::Page.into();
        let attempts = self.config.scan_retries;

        self.read_register(address, &PRESENCE, attempts).ok()?;
        debug!("{address}: device present");

        let identity = self.classify(address, attempts);
        let mut probe = Probe {
            address,
            identity,
            remaining_attempts: None,
            icc_max: None,
        };

        if let Identity::Family(family) = identity {
            let registers = &family.profile().registers;
            if let Some(counter) = registers.attempt_counter {
                probe.remaining_attempts = self
                    .read_register(address, &counter, attempts)
                    .ok()
                    .and_then(|word| u16::try_from(word).ok())
                    .map(|word| AttemptCounter::from_word(word).remaining());
                probe.icc_max = self
                    .read_register(address, &registers.icc_max, attempts)
                    .ok();
            }
        }
        Some(probe)
    }

    fn classify(&mut self, address: TargetAddress, attempts: u8) -> Identity {
        if self.read_register(address, &isl::DEVICE_ID, attempts) == Ok(isl::ISL69127_ID) {
            return Identity::Isl69127;
        }

        for family in SCAN_ORDER {
            let profile = family.profile();
            let mut matched = 0;
            for step in profile.identification() {
                let StepKind::Identify(expected) = step.kind else {
                    break;
                };
                match self.read_register(address, &step.register, attempts) {
                    Ok(found) if found == expected => matched += 1,
                    _ => break,
                }
            }

            if matched == profile.identification().count() {
                return Identity::Family(family);
            }
            if matched >= 2 {
                return Identity::Partial(family);
            }
        }
        Identity::Unknown
    }

    fn execute(
        &mut self,
        profile: &DeviceProfile,
        address: TargetAddress,
        step: &Step,
        state: &mut RunState,
    ) -> Result<Reply> {
        let attempts = self.config.retries;
        let register = &step.register;

        if state.exhausted && step.writes() {
            return Err(StepError::AttemptsExhausted);
        }

        match step.kind {
            StepKind::Identify(expected) => {
                let found = self.read_register(address, register, attempts)?;
                if found == expected {
                    Ok(Reply::Value(found))
                } else {
                    Err(StepError::UnexpectedDevice { expected, found })
                }
            }
            StepKind::Read => {
                let value = self.read_register(address, register, attempts)?;
                if profile.is_icc_max_read(step) {
                    info!(
                        "{address}: {} ICC_MAX={}",
                        profile.family,
                        WireValue(register.format, value)
                    );
                    // Only the low byte holds amps.
                    if value & 0xFF == profile.icc_max_target & 0xFF {
                        return Ok(Reply::AlreadySet(value));
                    }
                }
                Ok(Reply::Value(value))
            }
            StepKind::Write(value) => {
                self.write_register(address, register, value, attempts)?;
                if profile.is_icc_max_write(step) {
                    state.icc_max_written = true;
                }
                Ok(Reply::Ack)
            }
            StepKind::WriteVerify(value) => {
                self.write_register(address, register, value, attempts)?;
                let found = self
                    .read_register(address, register, attempts)
                    .map_err(|e| match e {
                        StepError::Transport(kind) => StepError::ReadBack(kind),
                        other => other,
                    })?;
                if found != value {
                    return Err(StepError::VerificationMismatch {
                        expected: value,
                        found,
                    });
                }
                if profile.is_icc_max_write(step) {
                    state.icc_max_written = true;
                }
                Ok(Reply::Value(found))
            }
            StepKind::Unlock(_, key) | StepKind::Relock(_, key) => {
                self.write_register(address, register, key, attempts)?;
                Ok(Reply::Ack)
            }
            StepKind::NvmCommit => {
                state.require_icc_max()?;
                self.write_register(address, register, 0, attempts)?;
                state.committed = true;
                Ok(Reply::Ack)
            }
            StepKind::AttemptCounter => {
                state.require_icc_max()?;
                let word = self.read_register(address, register, attempts)?;
                let word = u16::try_from(word).map_err(|_| FormatError::Range(word))?;
                let counter = AttemptCounter::from_word(word);
                // After a store a count of zero only means the last attempt was used.
                if counter.is_exhausted() && !state.committed {
                    state.exhausted = true;
                    error!(
                        "{address}: {} accepts no further configuration writes",
                        profile.family
                    );
                    Err(StepError::AttemptsExhausted)
                } else {
                    info!("{address}: {} remaining attempts", counter.remaining());
                    Ok(Reply::Remaining(counter.remaining()))
                }
            }
        }
    }

    fn read_register(
        &mut self,
        address: TargetAddress,
        register: &Register,
        attempts: u8,
    ) -> Result<u32> {
        let len = register.format.reply_len();
        let mut reply = [0u8; Format::MAX_REPLY];
        self.retry(address, attempts, |engine| {
            engine.select_page(address, register.page)?;
            engine
                .bus
                .write_read(address.get(), &[register.command], &mut reply[..len])
                .map_err(|e| e.kind())?;
            Ok(())
        })?;
        debug!(
            "{address}: read {:02X} = {}",
            register.command,
            HexBytes(&reply[..len])
        );
        Ok(codec::decode(register.format, &reply[..len])?)
    }

    fn write_register(
        &mut self,
        address: TargetAddress,
        register: &Register,
        value: u32,
        attempts: u8,
    ) -> Result<()> {
        let payload = codec::encode(register.format, value)?;
        let mut frame = [0u8; MAX_FRAME];
        frame[0] = register.command;
        frame[1..=payload.len()].copy_from_slice(&payload);
        let frame = &frame[..=payload.len()];

        debug!("{address}: write {}", HexBytes(frame));
        self.retry(address, attempts, |engine| {
            engine.select_page(address, register.page)?;
            engine
                .bus
                .write(address.get(), frame)
                .map_err(|e| e.kind())?;
            Ok(())
        })
    }

    /// Repeat `op` on transport failures. A failed attempt leaves the selected page unknown.
    fn retry<T>(
        &mut self,
        address: TargetAddress,
        attempts: u8,
        mut op: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 1;
        loop {
            match op(self) {
                Err(StepError::Transport(kind)) => {
                    self.page = None;
                    if attempt >= attempts {
                        return Err(StepError::Transport(kind));
                    }
                    warn!("{address}: {kind:?}, retry #{attempt}");
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    fn select_page(
        &mut self,
        address: TargetAddress,
        page: Option<u8>,
    ) -> core::result::Result<(), ErrorKind> {
        let Some(page) = page else {
            return Ok(());
        };
        if self.page == Some(page) {
            return Ok(());
        }
        debug!("{address}: PAGE {page:02X}");
        self.bus
            .write(address.get(), &[self.page_select, page])
            .map_err(|e| e.kind())?;
        self.page = Some(page);
        Ok(())
    }
}
