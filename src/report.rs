//! Progress events emitted by the [`Engine`](crate::engine::Engine) and the console status lines
//! built from them.

use core::fmt::{self, Write};

use crate::{
    codec::WireValue,
    engine::{Identity, Probe, Reply, SequenceResult, StepResult},
    error::StepError,
    profile::{DeviceProfile, Step, StepKind},
    types::TargetAddress,
};

/// Something that happened while a sequence or scan was running.
///
/// Events are delivered in order, as they happen.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    /// A sequence starts on `address`.
    Begin {
        profile: &'static DeviceProfile,
        address: TargetAddress,
    },
    /// Every identification step matched.
    Identified {
        profile: &'static DeviceProfile,
        address: TargetAddress,
    },
    StepStarted {
        profile: &'static DeviceProfile,
        step: &'a Step,
    },
    StepFinished {
        profile: &'static DeviceProfile,
        result: &'a StepResult,
    },
    /// The sequence ended, normally or aborted.
    Finished { result: &'a SequenceResult },
    /// The scan moves to `address`.
    Scanning { address: TargetAddress },
    /// Something answered during a scan.
    Probed { probe: &'a Probe },
}

/// Consumer of [`Event`]s.
pub trait Reporter {
    fn report(&mut self, event: Event<'_>);
}

/// Discards everything.
impl Reporter for () {
    fn report(&mut self, _event: Event<'_>) {}
}

/// Writes the classic status lines, one per event that has something to say.
///
/// ```text
/// PXE1610C found: starting modd
/// set smb_password=OK
/// ICC_MAX=FF00
/// Write ICC_MAX=OK
/// ...
/// PXE1610C modd successful
/// ```
pub struct StatusLines<W> {
    out: W,
}

impl<W: Write> StatusLines<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        // Console output is best effort.
        let _ = self.out.write_fmt(args);
        let _ = self.out.write_char('\n');
    }

    fn step_finished(&mut self, profile: &DeviceProfile, result: &StepResult) {
        let step = &result.step;
        let outcome = &result.outcome;
        let status = if outcome.is_ok() { "OK" } else { "FAIL" };

        match step.kind {
            StepKind::Identify(_) => match outcome {
                Ok(_) => {}
                Err(StepError::UnexpectedDevice { .. }) => {
                    self.line(format_args!("{} not found", profile.family))
                }
                Err(_) => self.line(format_args!("Device detection error")),
            },
            StepKind::Read if profile.is_icc_max_read(step) => match outcome {
                Ok(Reply::AlreadySet(_)) => self.line(format_args!(
                    " ICC_MAX already at target - modification skipped."
                )),
                Ok(_) => {}
                Err(_) => self.line(format_args!("Read ICC_MAX=FAIL")),
            },
            StepKind::Read => {
                if outcome.is_err() {
                    self.line(format_args!("Read {:02X}=FAIL", step.register.command))
                }
            }
            StepKind::Write(_) | StepKind::WriteVerify(_) => {
                let name = if profile.is_icc_max_write(step) {
                    "ICC_MAX"
                } else {
                    "register"
                };
                match outcome {
                    Err(StepError::ReadBack(_)) => {
                        self.line(format_args!("Write {name}=OK"));
                        self.line(format_args!("verify {name}=FAIL"));
                    }
                    Err(StepError::VerificationMismatch { found, .. }) => {
                        self.line(format_args!("Write {name}=OK"));
                        self.line(format_args!(
                            "verify {name}=FAIL readback={}",
                            WireValue(step.register.format, *found)
                        ));
                    }
                    _ => self.line(format_args!("Write {name}={status}")),
                }
            }
            StepKind::Unlock(domain, _) => {
                self.line(format_args!("set {}={status}", domain.password_name()))
            }
            StepKind::Relock(domain, _) => {
                self.line(format_args!("clear {}={status}", domain.password_name()))
            }
            StepKind::NvmCommit => self.line(format_args!("upload_cfg_send_byte={status}")),
            StepKind::AttemptCounter => {
                let stored = profile.steps[..result.index]
                    .iter()
                    .any(|step| step.kind == StepKind::NvmCommit);
                let when = if stored { "new" } else { "old" };
                match outcome {
                    Ok(Reply::Remaining(remaining)) => {
                        self.line(format_args!(" {when} remaining attempts= {remaining:02X}"))
                    }
                    Err(StepError::AttemptsExhausted) => self.line(format_args!(
                        " {when} remaining attempts= 00 - no configuration writes left"
                    )),
                    _ => self.line(format_args!("read attempts=FAIL")),
                }
            }
        }
    }

    fn probed(&mut self, probe: &Probe) {
        let address = probe.address;
        self.line(format_args!(" found device at addr: {address}"));
        match probe.identity {
            Identity::Isl69127 => {
                self.line(format_args!("probably ISL69127 found at addr: {address}"))
            }
            Identity::Partial(family) => self.line(format_args!(
                "{} family controller found at addr: {address}",
                family.vendor()
            )),
            Identity::Family(family) => {
                if family.profile().identification().count() > 1 {
                    self.line(format_args!(
                        "{} family controller found at addr: {address}",
                        family.vendor()
                    ));
                    self.line(format_args!("{family} found at addr: {address}"));
                } else {
                    self.line(format_args!("probably {family} found at addr: {address}"));
                }
            }
            Identity::Unknown => {}
        }
        if let Some(remaining) = probe.remaining_attempts {
            self.line(format_args!(" remaining attempts= {remaining:02X}"));
        }
        if let Some(icc_max) = probe.icc_max {
            self.line(format_args!(" ICC_MAX= {:02X}", icc_max & 0xFF));
        }
    }
}

impl<W: Write> Reporter for StatusLines<W> {
    fn report(&mut self, event: Event<'_>) {
        match event {
            Event::Begin { .. } => {}
            Event::Identified { profile, .. } => {
                self.line(format_args!("{} found: starting modd", profile.family))
            }
            Event::StepStarted { profile, step } => {
                if profile.is_icc_max_write(step) {
                    self.line(format_args!(
                        "ICC_MAX={}",
                        WireValue(step.register.format, profile.icc_max_target)
                    ));
                }
            }
            Event::StepFinished { profile, result } => self.step_finished(profile, result),
            Event::Finished { result } => {
                let verdict = if result.success() {
                    "successful"
                } else {
                    "failed"
                };
                self.line(format_args!("{} modd {verdict}", result.profile.family));
            }
            Event::Scanning { address } => self.line(format_args!("scanning at addr: {address}")),
            Event::Probed { probe } => self.probed(probe),
        }
    }
}
