//! CLI argument parsing

use std::{ffi::OsString, path::PathBuf};

use clap::{Parser, Subcommand};
use pmbus_iccmax::{ChipFamily, TargetAddress};

#[derive(Parser, Debug)]
#[command(name = "pmbus-iccmax")]
#[command(author, version, about = "Raise ICC_MAX on PMBus VRM controllers", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// I2C bus device
    #[arg(long, default_value = "/dev/i2c-1", global = true)]
    pub bus: PathBuf,

    /// Attempts per bus transaction
    #[arg(long, default_value_t = 4, global = true)]
    pub retries: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Controller addresses to modify
#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct TargetArgs {
    /// 7-bit address in hex, e.g. 5A
    pub address: TargetAddress,

    /// Second controller of a dual VRM board
    pub second: Option<TargetAddress>,
}

impl TargetArgs {
    pub fn targets(&self) -> Vec<TargetAddress> {
        std::iter::once(self.address).chain(self.second).collect()
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Probe an address range and identify the controllers found
    Scan {
        /// First address in hex
        start: TargetAddress,
        /// Last address in hex
        end: TargetAddress,
    },

    /// Modify an Infineon / Primarion PXE1610C
    #[command(name = "PXE1610C")]
    Pxe1610c(TargetArgs),

    /// Modify an MPS MP2955A
    #[command(name = "MP2955A")]
    Mp2955a(TargetArgs),

    /// Modify a TI TPS53678
    #[command(name = "TPS53678")]
    Tps53678(TargetArgs),

    /// Modify a TI TPS53679
    #[command(name = "TPS53679")]
    Tps53679(TargetArgs),
}

impl Commands {
    /// Family and addresses of a modify command, `None` for a scan.
    pub fn modify(&self) -> Option<(ChipFamily, &TargetArgs)> {
        match self {
            Commands::Scan { .. } => None,
            Commands::Pxe1610c(args) => Some((ChipFamily::Pxe1610c, args)),
            Commands::Mp2955a(args) => Some((ChipFamily::Mp2955a, args)),
            Commands::Tps53678(args) => Some((ChipFamily::Tps53678, args)),
            Commands::Tps53679(args) => Some((ChipFamily::Tps53679, args)),
        }
    }
}

/// Accept the single dash command style, `-scan 10 77` or `-PXE1610C 5A`.
pub fn normalize_legacy_args<I, S>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            let command = arg.to_str().and_then(legacy_command).map(OsString::from);
            command.unwrap_or(arg)
        })
        .collect()
}

fn legacy_command(arg: &str) -> Option<&str> {
    let name = arg.strip_prefix('-')?;
    (name == "scan" || name.parse::<ChipFamily>().is_ok()).then_some(name)
}
